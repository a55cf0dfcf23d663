use axum::{
    extract::State,
    response::{IntoResponse, Json},
    Extension,
};
use serde_json::{Map, Value as JsonValue};
use validator::Validate;

use crate::{dto::profile_dto::ProfilePayload, error::Result, models::user::AuthUser, AppState};

#[axum::debug_handler]
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let profile = state.profile_service.get(&user).await?;
    Ok(Json(profile))
}

#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ProfilePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let profile = state.profile_service.update(&user, payload).await?;
    Ok(Json(profile))
}

#[axum::debug_handler]
pub async fn get_notifications(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let settings = state.profile_service.notifications(&user).await?;
    Ok(Json(settings))
}

#[axum::debug_handler]
pub async fn update_notifications(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<Map<String, JsonValue>>,
) -> Result<impl IntoResponse> {
    let settings = state.profile_service.update_notifications(&user, payload).await?;
    Ok(Json(settings))
}
