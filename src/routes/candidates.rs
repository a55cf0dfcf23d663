use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json},
    Extension,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::candidate_dto::UpdateCandidateStatusPayload, error::Result, models::user::AuthUser,
    AppState,
};

#[axum::debug_handler]
pub async fn list_candidates(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let candidates = state.candidate_service.list(&user).await?;
    Ok(Json(candidates))
}

#[axum::debug_handler]
pub async fn update_candidate_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCandidateStatusPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let status = state.candidate_service.set_status(id, &payload.status, &user).await?;
    Ok(Json(json!({ "id": id, "status": status })))
}
