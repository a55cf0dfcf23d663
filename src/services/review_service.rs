use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::dto::assessment_dto::decimal_to_f64;
use crate::dto::review_dto::{
    CompleteReviewPayload, CompleteReviewResponse, ReleaseResponse, ReviewQuestion, ReviewView,
    UpdateAnswerPayload,
};
use crate::error::{Error, Result};
use crate::models::question::Question;
use crate::models::review::{GradedAnswer, Review};
use crate::models::user::AuthUser;
use crate::services::audit_service::AuditService;
use crate::services::grading_service::GradingService;

const REVIEW_COLUMNS: &str = r#"
    id, attempt_id, graded_answers, auto_score, final_score, passed, overall_feedback,
    review_status, results_released, reviewed_by, reviewed_at, created_at, updated_at
"#;

/// Applies a reviewer's change to one answer. Only the fields present are touched.
pub fn apply_update(answer: &mut GradedAnswer, payload: &UpdateAnswerPayload) -> Result<()> {
    if let Some(raw) = payload.manual_score {
        let score = raw.round() as i64;
        if score < 0 || score > i64::from(answer.max_points) {
            return Err(Error::BadRequest(format!(
                "Score must be between 0 and {}",
                answer.max_points
            )));
        }
        answer.manual_score = Some(score as i32);
    }
    if let Some(correct) = payload.is_correct {
        answer.manual_is_correct = Some(correct);
        if payload.manual_score.is_none() {
            answer.manual_score = Some(if correct { answer.max_points } else { 0 });
        }
    }
    if let Some(notes) = &payload.review_notes {
        let notes = notes.trim();
        answer.review_notes = (!notes.is_empty()).then(|| notes.to_string());
    }
    Ok(())
}

/// Final percentage over all answers and whether it clears the bar.
pub fn final_result(graded: &[GradedAnswer], passing_score: Decimal) -> (Decimal, bool) {
    let (earned, max) = GradingService::totals(graded);
    let score = GradingService::percentage(earned, max);
    (score, score >= passing_score)
}

#[derive(FromRow)]
struct ReviewContext {
    #[sqlx(flatten)]
    review: Review,
    assessment_id: Uuid,
    assessment_title: String,
    recruiter_id: Uuid,
    passing_score: Decimal,
    questions: serde_json::Value,
    candidate_id: Uuid,
    candidate_name: String,
    candidate_email: String,
    started_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
}

const CONTEXT_SELECT: &str = r#"
    SELECT r.id, r.attempt_id, r.graded_answers, r.auto_score, r.final_score, r.passed,
           r.overall_feedback, r.review_status, r.results_released, r.reviewed_by, r.reviewed_at,
           r.created_at, r.updated_at,
           a.id AS assessment_id, a.title AS assessment_title, a.recruiter_id, a.passing_score,
           a.questions,
           u.id AS candidate_id, u.full_name AS candidate_name, u.email AS candidate_email,
           t.started_at, t.submitted_at
    FROM reviews r
    JOIN assessment_attempts t ON t.id = r.attempt_id
    JOIN assessments a ON a.id = t.assessment_id
    JOIN users u ON u.id = t.interviewee_id
"#;

impl ReviewContext {
    fn graded(&self) -> Result<Vec<GradedAnswer>> {
        Ok(serde_json::from_value(self.review.graded_answers.clone())?)
    }

    fn view(&self) -> Result<ReviewView> {
        let questions: Vec<Question> = serde_json::from_value(self.questions.clone()).unwrap_or_default();
        let graded = self.graded()?;
        let items = graded
            .iter()
            .map(|g| ReviewQuestion::new(g, questions.iter().find(|q| q.id == g.question_id)))
            .collect();
        let time_spent = self
            .submitted_at
            .map(|end| crate::utils::time::elapsed_secs(self.started_at, end))
            .unwrap_or(0);

        Ok(ReviewView {
            review_id: self.review.id,
            attempt_id: self.review.attempt_id,
            assessment_id: self.assessment_id,
            assessment_title: self.assessment_title.clone(),
            candidate_id: self.candidate_id,
            candidate_name: self.candidate_name.clone(),
            candidate_email: self.candidate_email.clone(),
            time_spent,
            completed_at: self.submitted_at,
            auto_score: decimal_to_f64(self.review.auto_score),
            final_score: self.review.final_score.map(decimal_to_f64),
            passed: self.review.passed,
            passing_score: decimal_to_f64(self.passing_score),
            review_status: self.review.review_status.clone(),
            results_released: self.review.results_released,
            overall_feedback: self.review.overall_feedback.clone(),
            questions: items,
        })
    }

    fn ensure_manager(&self, user: &AuthUser) -> Result<()> {
        if !user.may_manage(self.recruiter_id) {
            return Err(Error::Forbidden("You do not own this assessment".into()));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct ReviewService {
    pool: PgPool,
    audit: AuditService,
}

impl ReviewService {
    pub fn new(pool: PgPool, audit: AuditService) -> Self {
        Self { pool, audit }
    }

    pub async fn get_for_attempt(&self, assessment_id: Uuid, attempt_id: Uuid, user: &AuthUser) -> Result<ReviewView> {
        let ctx = sqlx::query_as::<_, ReviewContext>(&format!(
            "{CONTEXT_SELECT} WHERE r.attempt_id = $1 AND a.id = $2"
        ))
        .bind(attempt_id)
        .bind(assessment_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Review not found".into()))?;
        ctx.ensure_manager(user)?;
        ctx.view()
    }

    /// Idempotent: repeating the same update leaves the review unchanged.
    pub async fn update_answer(
        &self,
        review_id: Uuid,
        question_id: i32,
        payload: UpdateAnswerPayload,
        user: &AuthUser,
    ) -> Result<ReviewQuestion> {
        let mut tx = self.pool.begin().await?;
        let ctx = sqlx::query_as::<_, ReviewContext>(&format!(
            "{CONTEXT_SELECT} WHERE r.id = $1 FOR UPDATE OF r"
        ))
        .bind(review_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Review not found".into()))?;
        ctx.ensure_manager(user)?;

        let mut graded = ctx.graded()?;
        let answer = graded
            .iter_mut()
            .find(|a| a.question_id == question_id)
            .ok_or_else(|| Error::NotFound(format!("Question {} is not part of this review", question_id)))?;
        apply_update(answer, &payload)?;
        let updated = answer.clone();

        // A finished review is recomputed so the stored score never goes stale.
        let (final_score, passed) = if ctx.review.review_status == "completed" {
            let (score, passed) = final_result(&graded, ctx.passing_score);
            (Some(score), Some(passed))
        } else {
            (ctx.review.final_score, ctx.review.passed)
        };

        sqlx::query(
            "UPDATE reviews SET graded_answers = $2, final_score = $3, passed = $4, updated_at = NOW() WHERE id = $1",
        )
        .bind(review_id)
        .bind(serde_json::to_value(&graded)?)
        .bind(final_score)
        .bind(passed)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let questions: Vec<Question> = serde_json::from_value(ctx.questions.clone()).unwrap_or_default();
        Ok(ReviewQuestion::new(
            &updated,
            questions.iter().find(|q| q.id == question_id),
        ))
    }

    pub async fn complete(
        &self,
        review_id: Uuid,
        payload: CompleteReviewPayload,
        user: &AuthUser,
    ) -> Result<CompleteReviewResponse> {
        let ctx = self.context(review_id).await?;
        ctx.ensure_manager(user)?;

        let graded = ctx.graded()?;
        let (final_score, passed) = final_result(&graded, ctx.passing_score);
        let feedback = payload
            .overall_feedback
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty());

        let review = sqlx::query_as::<_, Review>(&format!(
            r#"UPDATE reviews SET final_score = $2, passed = $3, overall_feedback = $4,
                   review_status = 'completed', reviewed_by = $5, reviewed_at = NOW(), updated_at = NOW()
               WHERE id = $1
               RETURNING {REVIEW_COLUMNS}"#
        ))
        .bind(review_id)
        .bind(final_score)
        .bind(passed)
        .bind(feedback)
        .bind(user.id)
        .fetch_one(&self.pool)
        .await?;

        self.audit
            .record(
                user.id,
                "review_completed",
                "review",
                review.id,
                Some(json!({ "final_score": decimal_to_f64(final_score), "passed": passed })),
            )
            .await;
        tracing::info!(review_id = %review.id, passed, "review completed");

        Ok(CompleteReviewResponse {
            review_id: review.id,
            final_score: decimal_to_f64(final_score),
            passed,
            review_status: review.review_status,
        })
    }

    pub async fn release(&self, review_id: Uuid, user: &AuthUser) -> Result<ReleaseResponse> {
        let ctx = self.context(review_id).await?;
        ctx.ensure_manager(user)?;
        if ctx.review.review_status != "completed" {
            return Err(Error::BadRequest(
                "Review must be completed before releasing results".into(),
            ));
        }

        sqlx::query("UPDATE reviews SET results_released = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(review_id)
            .execute(&self.pool)
            .await?;
        self.audit
            .record(user.id, "results_released", "review", review_id, None)
            .await;

        Ok(ReleaseResponse {
            review_id,
            results_released: true,
        })
    }

    /// The candidate's own review, once results are released.
    pub async fn candidate_review(&self, attempt_id: Uuid, user: &AuthUser) -> Result<ReviewView> {
        let ctx = sqlx::query_as::<_, ReviewContext>(&format!("{CONTEXT_SELECT} WHERE r.attempt_id = $1"))
            .bind(attempt_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Review not found".into()))?;
        if ctx.candidate_id != user.id {
            return Err(Error::Forbidden("This attempt belongs to someone else".into()));
        }
        if !ctx.review.results_released {
            return Err(Error::Forbidden("Results have not been released yet".into()));
        }
        ctx.view()
    }

    async fn context(&self, review_id: Uuid) -> Result<ReviewContext> {
        sqlx::query_as::<_, ReviewContext>(&format!("{CONTEXT_SELECT} WHERE r.id = $1"))
            .bind(review_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Review not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value as JsonValue;

    fn answer(max_points: i32, auto_score: i32) -> GradedAnswer {
        GradedAnswer {
            question_id: 1,
            question_text: "Explain borrowing".into(),
            question_type: "essay".into(),
            candidate_answer: JsonValue::String("...".into()),
            correct_answer: JsonValue::Null,
            max_points,
            auto_score,
            auto_is_correct: None,
            manual_score: None,
            manual_is_correct: None,
            review_notes: None,
            needs_review: true,
        }
    }

    #[test]
    fn manual_score_is_rounded_and_bounded() {
        let mut a = answer(10, 0);
        apply_update(&mut a, &UpdateAnswerPayload { manual_score: Some(7.6), ..Default::default() }).unwrap();
        assert_eq!(a.manual_score, Some(8));

        let err = apply_update(&mut a, &UpdateAnswerPayload { manual_score: Some(11.0), ..Default::default() });
        assert!(err.is_err());
        assert_eq!(a.manual_score, Some(8));
    }

    #[test]
    fn correctness_alone_awards_full_or_zero() {
        let mut a = answer(5, 0);
        apply_update(&mut a, &UpdateAnswerPayload { is_correct: Some(true), ..Default::default() }).unwrap();
        assert_eq!(a.manual_score, Some(5));
        apply_update(&mut a, &UpdateAnswerPayload { is_correct: Some(false), ..Default::default() }).unwrap();
        assert_eq!(a.manual_score, Some(0));
    }

    #[test]
    fn repeating_an_update_is_idempotent() {
        let payload = UpdateAnswerPayload {
            manual_score: Some(3.0),
            is_correct: Some(true),
            review_notes: Some(" partially right ".into()),
        };
        let mut once = answer(5, 0);
        apply_update(&mut once, &payload).unwrap();
        let mut twice = once.clone();
        apply_update(&mut twice, &payload).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.manual_score, Some(3));
        assert_eq!(once.review_notes.as_deref(), Some("partially right"));
    }

    #[test]
    fn final_result_uses_manual_scores() {
        let mut essay = answer(10, 0);
        essay.manual_score = Some(6);
        let mc = GradedAnswer { question_id: 2, needs_review: false, ..answer(10, 10) };
        let (score, passed) = final_result(&[essay, mc], Decimal::from(70));
        assert_eq!(score, Decimal::from(80));
        assert!(passed);
    }
}
