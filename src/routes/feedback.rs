use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::feedback_dto::{CreateFeedbackPayload, FeedbackList, UpdateFeedbackPayload},
    error::Result,
    models::user::AuthUser,
    AppState,
};

#[axum::debug_handler]
pub async fn create_feedback(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateFeedbackPayload>,
) -> Result<impl IntoResponse> {
    user.require_interviewee()?;
    payload.validate()?;
    let feedback = state.feedback_service.create(payload, &user).await?;
    Ok((StatusCode::CREATED, Json(feedback)))
}

#[axum::debug_handler]
pub async fn list_feedback(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let feedback = state.feedback_service.list(&user).await?;
    Ok(Json(FeedbackList { feedback }))
}

#[axum::debug_handler]
pub async fn feedback_stats(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let stats = state.feedback_service.stats(state.clock.now()).await?;
    Ok(Json(stats))
}

#[axum::debug_handler]
pub async fn update_feedback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateFeedbackPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let feedback = state.feedback_service.update(id, payload).await?;
    Ok(Json(feedback))
}
