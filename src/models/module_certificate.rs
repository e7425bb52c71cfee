use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ModuleCertificate {
    pub id: Uuid,
    pub module_id: Uuid,
    pub student_id: Uuid,
    pub certificate_url: String,
    pub grade: rust_decimal::Decimal,
    pub issued_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}
