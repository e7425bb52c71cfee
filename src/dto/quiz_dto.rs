use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

use crate::models::quiz_answer::QuizAnswer;
use crate::models::quiz_attempt::QuizAttempt;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartAttemptRequest {
    pub quiz_id: Uuid,
    pub enrollment_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    pub attempt_id: Uuid,
    pub question_id: Uuid,
    pub answer: JsonValue,
    #[validate(range(min = 0))]
    pub time_spent: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerResponse {
    pub answer: QuizAnswer,
    pub is_correct: bool,
}

/// Per-question entry of the graded breakdown, returned from attempt
/// completion only when the quiz allows revealing correct answers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerReview {
    pub question_id: Uuid,
    pub prompt: String,
    pub submitted_answer: Option<JsonValue>,
    pub correct_answer: JsonValue,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteAttemptResponse {
    pub score: i32,
    pub total_questions: i32,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answers: Option<Vec<AnswerReview>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptDetailResponse {
    pub attempt: QuizAttempt,
    pub answers: Vec<QuizAnswer>,
}
