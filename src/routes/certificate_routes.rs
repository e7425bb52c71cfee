use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use validator::Validate;

use crate::dto::certificate_dto::{
    IssueCourseCertificateRequest, IssueModuleCertificateRequest, VerifyCertificateResponse,
};
use crate::middleware::auth::AuthUser;
use crate::AppState;

#[axum::debug_handler]
pub async fn issue_module_certificate(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<IssueModuleCertificateRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;
    let certificate = state
        .certificate_service
        .issue_module_certificate(user.id, req.module_id, req.grade)
        .await?;
    Ok((StatusCode::CREATED, Json(certificate)).into_response())
}

#[axum::debug_handler]
pub async fn issue_course_certificate(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<IssueCourseCertificateRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;
    let certificate = state
        .certificate_service
        .issue_course_certificate(user.id, req.course_id)
        .await?;
    Ok((StatusCode::CREATED, Json(certificate)).into_response())
}

#[axum::debug_handler]
pub async fn list_certificates(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> crate::error::Result<Response> {
    let certificates = state.certificate_service.list_for_student(user.id).await?;
    Ok(Json(certificates).into_response())
}

/// Public endpoint; no principal involved.
#[axum::debug_handler]
pub async fn verify_certificate(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> crate::error::Result<Response> {
    let (is_valid, certificate) = state.certificate_service.verify_certificate(&code).await?;
    Ok(Json(VerifyCertificateResponse {
        is_valid,
        certificate,
    })
    .into_response())
}
