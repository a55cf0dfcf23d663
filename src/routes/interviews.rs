use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::interview_dto::{CandidateList, CreateInterviewPayload, InterviewList, UpdateInterviewPayload},
    error::Result,
    models::user::AuthUser,
    AppState,
};

#[axum::debug_handler]
pub async fn list_interviews(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let interviews = state.interview_service.list(&user).await?;
    Ok(Json(InterviewList { interviews }))
}

#[axum::debug_handler]
pub async fn create_interview(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateInterviewPayload>,
) -> Result<impl IntoResponse> {
    user.require_recruiter()?;
    payload.validate()?;
    let interview = state.interview_service.create(payload, &user).await?;
    Ok((StatusCode::CREATED, Json(interview)))
}

#[axum::debug_handler]
pub async fn update_interview(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateInterviewPayload>,
) -> Result<impl IntoResponse> {
    user.require_recruiter()?;
    payload.validate()?;
    let interview = state.interview_service.update(id, payload, &user).await?;
    Ok(Json(interview))
}

#[axum::debug_handler]
pub async fn delete_interview(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    user.require_recruiter()?;
    state.interview_service.delete(id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Interviewees a recruiter can schedule with.
#[axum::debug_handler]
pub async fn schedulable_candidates(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let candidates = state.interview_service.candidates().await?;
    Ok(Json(CandidateList { candidates }))
}
