use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Course-level certificate. The verification code is the public handle;
/// the digital signature binds the identity fields so a tampered row fails
/// verification even if it is still marked valid.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: Uuid,
    pub course_id: Uuid,
    pub user_id: Uuid,
    pub verification_code: String,
    pub digital_signature: String,
    pub is_valid: bool,
    pub issued_at: DateTime<Utc>,
}
