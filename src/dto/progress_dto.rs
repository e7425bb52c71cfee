use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteLessonRequest {
    pub enrollment_id: Uuid,
    pub lesson_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordTimeRequest {
    pub enrollment_id: Uuid,
    pub lesson_id: Uuid,
    #[validate(range(min = 0))]
    pub seconds: i32,
}
