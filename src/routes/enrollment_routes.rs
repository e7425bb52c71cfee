use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::enrollment_dto::EnrollRequest;
use crate::middleware::auth::AuthUser;
use crate::AppState;

#[axum::debug_handler]
pub async fn enroll(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<EnrollRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;
    let enrollment = state
        .enrollment_service
        .enroll(user.id, req.course_id)
        .await?;
    Ok((StatusCode::CREATED, Json(enrollment)).into_response())
}

#[axum::debug_handler]
pub async fn list_enrollments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> crate::error::Result<Response> {
    let enrollments = state.enrollment_service.list_for_student(user.id).await?;
    Ok(Json(enrollments).into_response())
}

#[axum::debug_handler]
pub async fn get_enrollment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let enrollment = state
        .enrollment_service
        .get_for_student(user.id, course_id)
        .await?;
    Ok(Json(enrollment).into_response())
}

#[axum::debug_handler]
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    state.enrollment_service.withdraw(user.id, course_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
