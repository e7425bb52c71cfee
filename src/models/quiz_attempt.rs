use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One sitting of a quiz. `completed_at = NULL` means the attempt is still
/// open for answer submissions; score and passed are set exactly once, at
/// completion.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub enrollment_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub score: Option<i32>,
    pub total_questions: i32,
    pub passed: Option<bool>,
    pub created_at: DateTime<Utc>,
}
