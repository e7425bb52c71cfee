use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use validator::Validate;

use crate::dto::progress_dto::{CompleteLessonRequest, RecordTimeRequest};
use crate::middleware::auth::AuthUser;
use crate::AppState;

#[axum::debug_handler]
pub async fn complete_lesson(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CompleteLessonRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;
    let progress = state
        .lesson_progress_service
        .mark_lesson_complete(user.id, req.enrollment_id, req.lesson_id)
        .await?;
    Ok(Json(progress).into_response())
}

#[axum::debug_handler]
pub async fn record_time(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<RecordTimeRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;
    state
        .lesson_progress_service
        .record_time_spent(user.id, req.enrollment_id, req.lesson_id, req.seconds)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
