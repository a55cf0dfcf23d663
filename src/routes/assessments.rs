use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        assessment_dto::{decimal_to_f64, AssessmentPayload, SendInvitePayload},
        review_dto::{CompleteReviewPayload, UpdateAnswerPayload},
    },
    error::Result,
    models::user::AuthUser,
    services::export_service::{results_filename, ExportService, XLSX_CONTENT_TYPE},
    AppState,
};

#[axum::debug_handler]
pub async fn list_assessments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let assessments = state.assessment_service.list(&user).await?;
    Ok(Json(assessments))
}

#[axum::debug_handler]
pub async fn create_assessment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<AssessmentPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let assessment = state.assessment_service.create(payload, &user).await?;
    Ok((StatusCode::CREATED, Json(assessment)))
}

#[axum::debug_handler]
pub async fn get_assessment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let assessment = state.assessment_service.get(id, &user).await?;
    Ok(Json(assessment))
}

#[axum::debug_handler]
pub async fn update_assessment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssessmentPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let assessment = state.assessment_service.update(id, payload, &user).await?;
    Ok(Json(assessment))
}

#[axum::debug_handler]
pub async fn delete_assessment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.assessment_service.delete(id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn assessment_results(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let results = state.assessment_service.results(id, &user).await?;
    Ok(Json(results))
}

/// Results workbook as an attachment.
#[axum::debug_handler]
pub async fn export_results(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let assessment = state.assessment_service.get_owned(id, &user).await?;
    let results = state.assessment_service.results(id, &user).await?;
    let now = state.clock.now();

    let buffer = ExportService::generate_results_xlsx(
        &assessment.title,
        decimal_to_f64(assessment.passing_score),
        &results,
        now,
    )?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        results_filename(&assessment.title, now)
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        buffer,
    ))
}

#[axum::debug_handler]
pub async fn send_invite(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SendInvitePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let report = state.assessment_service.send_invites(payload, &user).await?;
    Ok(Json(report))
}

#[axum::debug_handler]
pub async fn get_submission_review(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((assessment_id, attempt_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    let review = state
        .review_service
        .get_for_attempt(assessment_id, attempt_id, &user)
        .await?;
    Ok(Json(review))
}

#[axum::debug_handler]
pub async fn update_review_answer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((review_id, question_id)): Path<(Uuid, i32)>,
    Json(payload): Json<UpdateAnswerPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let question = state
        .review_service
        .update_answer(review_id, question_id, payload, &user)
        .await?;
    Ok(Json(question))
}

#[axum::debug_handler]
pub async fn complete_review(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(review_id): Path<Uuid>,
    payload: Option<Json<CompleteReviewPayload>>,
) -> Result<impl IntoResponse> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    payload.validate()?;
    let result = state.review_service.complete(review_id, payload, &user).await?;
    Ok(Json(result))
}

#[axum::debug_handler]
pub async fn release_results(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(review_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let result = state.review_service.release(review_id, &user).await?;
    Ok(Json(result))
}
