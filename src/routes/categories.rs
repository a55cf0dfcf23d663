use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::category_dto::CategoryPayload, error::Result, models::user::AuthUser, AppState,
};

#[axum::debug_handler]
pub async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let categories = state.category_service.list().await?;
    Ok(Json(categories))
}

#[axum::debug_handler]
pub async fn create_category(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CategoryPayload>,
) -> Result<impl IntoResponse> {
    user.require_recruiter()?;
    payload.validate()?;
    let category = state.category_service.create(payload, user.id).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[axum::debug_handler]
pub async fn update_category(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryPayload>,
) -> Result<impl IntoResponse> {
    user.require_recruiter()?;
    payload.validate()?;
    let category = state.category_service.update(id, payload).await?;
    Ok(Json(category))
}

#[axum::debug_handler]
pub async fn delete_category(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    user.require_recruiter()?;
    state.category_service.delete(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
