use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

/// A quiz hangs off a course or off a single lesson, never both (enforced by
/// a CHECK constraint).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: Uuid,
    pub course_id: Option<Uuid>,
    pub lesson_id: Option<Uuid>,
    pub title: String,
    pub passing_score: i32,
    pub time_limit_minutes: Option<i32>,
    pub show_correct_answers: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "question_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    MultipleSelect,
    ShortAnswer,
    FillBlank,
}

/// `correct_answer` is a JSON string for single-answer types and a JSON array
/// of strings for `multiple_select`; grading compares exactly (set equality
/// for the array case).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub question_type: QuestionType,
    pub prompt: String,
    pub options: sqlx::types::Json<Vec<String>>,
    pub correct_answer: JsonValue,
    pub points: i32,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
}
