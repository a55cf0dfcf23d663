use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::session_dto::SubmitProblemPayload, error::Result, models::user::AuthUser, AppState,
};

#[axum::debug_handler]
pub async fn list_practice_categories(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let categories = state.session_service.list_practice_categories(user.id).await?;
    Ok(Json(categories))
}

/// Resumes a live session for the category or opens a new one.
#[axum::debug_handler]
pub async fn start_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(category_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let (session, created) = state.session_service.start(user.id, category_id).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(session)))
}

#[axum::debug_handler]
pub async fn get_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let session = state.session_service.get(user.id, session_id).await?;
    Ok(Json(session))
}

#[axum::debug_handler]
pub async fn submit_problem(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<SubmitProblemPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let result = state.session_service.submit(user.id, session_id, payload).await?;
    Ok(Json(result))
}
