use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::quiz_dto::{
    AttemptDetailResponse, CompleteAttemptResponse, StartAttemptRequest, SubmitAnswerRequest,
    SubmitAnswerResponse,
};
use crate::middleware::auth::AuthUser;
use crate::AppState;

#[axum::debug_handler]
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<StartAttemptRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;
    let attempt = state
        .quiz_service
        .start_attempt(user.id, req.quiz_id, req.enrollment_id)
        .await?;
    Ok((StatusCode::CREATED, Json(attempt)).into_response())
}

#[axum::debug_handler]
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<SubmitAnswerRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;
    let answer = state
        .quiz_service
        .submit_answer(
            user.id,
            req.attempt_id,
            req.question_id,
            req.answer,
            req.time_spent,
        )
        .await?;
    let response = SubmitAnswerResponse {
        is_correct: answer.is_correct,
        answer,
    };
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

#[axum::debug_handler]
pub async fn complete_attempt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(attempt_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let outcome = state
        .quiz_service
        .complete_attempt(user.id, attempt_id)
        .await?;
    let response = CompleteAttemptResponse {
        score: outcome.score,
        total_questions: outcome.total_questions,
        passed: outcome.passed,
        answers: outcome.review,
    };
    Ok(Json(response).into_response())
}

#[axum::debug_handler]
pub async fn get_attempt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(attempt_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let (attempt, answers) = state.quiz_service.get_attempt(user.id, attempt_id).await?;
    Ok(Json(AttemptDetailResponse { attempt, answers }).into_response())
}
