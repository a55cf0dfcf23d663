use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::practice_dto::{
        problem_json, ActiveProblemPayload, ProblemListQuery, ProblemPayload, SubmitAttemptPayload,
    },
    error::Result,
    models::{draft::DraftKind, user::AuthUser},
    services::{draft_service::DraftPayload, practice_service::Submission},
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct DraftQuery {
    #[serde(default)]
    pub kind: DraftKind,
}

/// Recruiters see answers and hidden tests. Candidates get public problems with their own progress.
#[axum::debug_handler]
pub async fn list_problems(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ProblemListQuery>,
) -> Result<impl IntoResponse> {
    if user.role.can_recruit() {
        let problems = state.practice_service.list(query, false).await?;
        let body = problems
            .iter()
            .map(|p| problem_json(p, true, None))
            .collect::<Result<Vec<_>>>()?;
        return Ok(Json(body));
    }

    let problems = state.practice_service.list(query, true).await?;
    let summaries = state.practice_service.attempt_summaries(user.id).await?;
    let body = problems
        .iter()
        .map(|p| problem_json(p, false, summaries.get(&p.id)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Json(body))
}

#[axum::debug_handler]
pub async fn list_public_problems(
    State(state): State<AppState>,
    Query(query): Query<ProblemListQuery>,
) -> Result<impl IntoResponse> {
    let problems = state.practice_service.list(query, true).await?;
    let body = problems
        .iter()
        .map(|p| problem_json(p, false, None))
        .collect::<Result<Vec<_>>>()?;
    Ok(Json(body))
}

#[axum::debug_handler]
pub async fn get_problem(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let problem = state.practice_service.get(id).await?;
    if user.role.can_recruit() {
        return Ok(Json(problem_json(&problem, true, None)?));
    }
    if !problem.is_public {
        return Err(crate::error::Error::NotFound("Practice problem not found".into()));
    }
    let summaries = state.practice_service.attempt_summaries(user.id).await?;
    Ok(Json(problem_json(&problem, false, summaries.get(&id))?))
}

#[axum::debug_handler]
pub async fn create_problem(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ProblemPayload>,
) -> Result<impl IntoResponse> {
    user.require_recruiter()?;
    payload.validate()?;
    let problem = state.practice_service.create(payload, user.id).await?;
    Ok((StatusCode::CREATED, Json(problem_json(&problem, true, None)?)))
}

#[axum::debug_handler]
pub async fn update_problem(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProblemPayload>,
) -> Result<impl IntoResponse> {
    user.require_recruiter()?;
    payload.validate()?;
    let problem = state.practice_service.update(id, payload).await?;
    Ok(Json(problem_json(&problem, true, None)?))
}

#[axum::debug_handler]
pub async fn delete_problem(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    user.require_recruiter()?;
    state.practice_service.delete(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn problem_attempts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    user.require_recruiter()?;
    let rows = state.practice_service.list_problem_attempts(id).await?;
    Ok(Json(rows))
}

#[axum::debug_handler]
pub async fn submit_attempt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitAttemptPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let submission = Submission::from_payload(payload, state.clock.now());
    let result = state.practice_service.submit_attempt(user.id, id, submission).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

#[axum::debug_handler]
pub async fn my_attempts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let attempts = state.practice_service.list_user_attempts(user.id).await?;
    Ok(Json(attempts))
}

#[axum::debug_handler]
pub async fn statistics(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let today = state.clock.now().date_naive();
    let stats = state.practice_service.statistics(user.id, today).await?;
    Ok(Json(stats))
}

/// `expired` is true only on the read that consumed the expiry of the latest save.
fn draft_body(
    kind: DraftKind,
    payload: Option<JsonValue>,
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
    expired: bool,
) -> Result<JsonValue> {
    let mut draft: DraftPayload = match payload {
        Some(value) => serde_json::from_value(value)?,
        None => DraftPayload::default(),
    };
    draft.expired_reported = None;
    let mut body = serde_json::to_value(&draft)?;
    if let Some(map) = body.as_object_mut() {
        map.insert("kind".into(), json!(kind.as_str()));
        map.insert("expired".into(), json!(expired));
        map.insert("updated_at".into(), json!(updated_at));
    }
    Ok(body)
}

/// An unsaved draft reads as an empty one.
#[axum::debug_handler]
pub async fn get_draft(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Query(query): Query<DraftQuery>,
) -> Result<impl IntoResponse> {
    let draft = state.draft_service.read(user.id, id, query.kind).await?;
    let body = match draft {
        Some((d, expired)) => draft_body(query.kind, Some(d.payload), Some(d.updated_at), expired)?,
        None => draft_body(query.kind, None, None, false)?,
    };
    Ok(Json(body))
}

#[axum::debug_handler]
pub async fn save_draft(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Query(query): Query<DraftQuery>,
    Json(payload): Json<DraftPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let draft = state.draft_service.save(user.id, id, query.kind, payload).await?;
    Ok(Json(draft_body(query.kind, Some(draft.payload), Some(draft.updated_at), false)?))
}

#[axum::debug_handler]
pub async fn delete_draft(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Query(query): Query<DraftQuery>,
) -> Result<impl IntoResponse> {
    state.draft_service.delete(user.id, id, query.kind).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn get_active(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let problem_id = state.draft_service.get_active(user.id).await?;
    Ok(Json(json!({ "problem_id": problem_id })))
}

#[axum::debug_handler]
pub async fn set_active(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ActiveProblemPayload>,
) -> Result<impl IntoResponse> {
    state.draft_service.set_active(user.id, payload.problem_id).await?;
    Ok(Json(json!({ "problem_id": payload.problem_id })))
}

#[axum::debug_handler]
pub async fn clear_active(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    state.draft_service.clear_active(user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_flag_follows_the_read_that_consumed_it() {
        let mut stored: DraftPayload =
            serde_json::from_value(json!({"code": "x", "time_left": 0})).unwrap();
        let first = stored.take_expiry();
        let second = stored.take_expiry();
        let saved = serde_json::to_value(&stored).unwrap();

        let body = draft_body(DraftKind::Coding, Some(saved.clone()), None, first).unwrap();
        assert_eq!(body["expired"], json!(true));
        assert_eq!(body["kind"], json!("coding"));
        assert!(body.get("expired_reported").is_none());

        let body = draft_body(DraftKind::Coding, Some(saved), None, second).unwrap();
        assert_eq!(body["expired"], json!(false));
        assert_eq!(body["time_left"], json!(0));
    }

    #[test]
    fn missing_draft_is_empty() {
        let body = draft_body(DraftKind::ShortAnswer, None, None, false).unwrap();
        assert_eq!(body["expired"], json!(false));
        assert!(body.get("code").is_none());
        assert_eq!(body["kind"], json!("short_answer"));
    }
}
