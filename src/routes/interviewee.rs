use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::assessment_dto::{InvitationQuery, SaveAnswerPayload},
    error::Result,
    models::user::AuthUser,
    AppState,
};

#[axum::debug_handler]
pub async fn list_invitations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let invitations = state.assessment_service.list_invitations(&user).await?;
    Ok(Json(invitations))
}

#[axum::debug_handler]
pub async fn accept_invitation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let invitation = state.assessment_service.accept_invitation(id, &user).await?;
    Ok(Json(json!({
        "id": invitation.id,
        "assessment_id": invitation.assessment_id,
        "status": invitation.status,
    })))
}

/// `?invitation=<id>` ties the view to an invitation sent to the caller.
#[axum::debug_handler]
pub async fn view_assessment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Query(query): Query<InvitationQuery>,
) -> Result<impl IntoResponse> {
    let view = state
        .assessment_service
        .candidate_view(id, &user, query.invitation, state.clock.now())
        .await?;
    Ok(Json(view))
}

#[axum::debug_handler]
pub async fn available_tests(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let tests = state.assessment_service.available(&user, state.clock.now()).await?;
    Ok(Json(json!({ "tests": tests })))
}

#[axum::debug_handler]
pub async fn test_assessments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let tests = state.assessment_service.available(&user, state.clock.now()).await?;
    Ok(Json(tests))
}

#[axum::debug_handler]
pub async fn start_assessment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    user.require_interviewee()?;
    let attempt = state.attempt_service.start(id, &user).await?;
    Ok((StatusCode::CREATED, Json(attempt)))
}

/// The caller's attempt on an assessment, if any.
#[axum::debug_handler]
pub async fn get_assessment_attempt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let attempt = state.attempt_service.for_assessment(id, &user).await?;
    Ok(Json(attempt))
}

#[axum::debug_handler]
pub async fn get_attempt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let attempt = state.attempt_service.get(attempt_id, &user).await?;
    Ok(Json(attempt))
}

#[axum::debug_handler]
pub async fn save_answer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(attempt_id): Path<Uuid>,
    Json(payload): Json<SaveAnswerPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let attempt = state.attempt_service.save_answer(attempt_id, &user, payload).await?;
    Ok(Json(attempt))
}

#[axum::debug_handler]
pub async fn submit_assessment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let result = state.attempt_service.submit(attempt_id, &user).await?;
    Ok(Json(result))
}

#[axum::debug_handler]
pub async fn attempts_summary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let rows = state.attempt_service.summary(&user).await?;
    Ok(Json(rows))
}

#[axum::debug_handler]
pub async fn attempt_review(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let review = state.review_service.candidate_review(attempt_id, &user).await?;
    Ok(Json(review))
}
