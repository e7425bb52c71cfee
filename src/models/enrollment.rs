use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A student's registration in a course. Status walks one way through
/// `enrolled` -> `in_progress` -> `completed`; progress is an integer percent
/// derived from lesson completions and never decreases.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub status: String,
    pub progress: i32,
    pub time_spent_seconds: i32,
    pub current_module_id: Option<Uuid>,
    pub current_lesson_id: Option<Uuid>,
    pub enrolled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub certificate_issued: bool,
    pub final_grade: Option<rust_decimal::Decimal>,
    pub updated_at: DateTime<Utc>,
}
