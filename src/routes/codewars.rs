use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};

use crate::{
    dto::{
        codewars_dto::{ImportPayload, SearchQuery},
        practice_dto::problem_json,
    },
    error::Result,
    models::user::AuthUser,
    AppState,
};

#[axum::debug_handler]
pub async fn get_challenge(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let challenge = state.codewars_service.challenge(&id).await?;
    Ok(Json(challenge))
}

#[axum::debug_handler]
pub async fn search_challenges(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse> {
    let challenges = state.codewars_service.search(&query).await?;
    Ok(Json(challenges))
}

#[axum::debug_handler]
pub async fn import_challenge(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Option<Json<ImportPayload>>,
) -> Result<impl IntoResponse> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let problem = state
        .codewars_service
        .import(&id, payload.category_id, user.id)
        .await?;
    Ok((StatusCode::CREATED, Json(problem_json(&problem, true, None)?)))
}
