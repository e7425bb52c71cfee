use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::certificate::Certificate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IssueModuleCertificateRequest {
    pub module_id: Uuid,
    #[validate(range(min = 0.0, max = 100.0))]
    pub grade: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IssueCourseCertificateRequest {
    pub course_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCertificateResponse {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Certificate>,
}
