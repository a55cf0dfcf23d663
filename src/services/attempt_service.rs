use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value as JsonValue};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::dto::assessment_dto::{
    decimal_to_f64, AttemptSummaryRow, AttemptView, SaveAnswerPayload, SubmitAssessmentResponse,
};
use crate::error::{Error, Result};
use crate::models::assessment::{Assessment, AssessmentAttempt};
use crate::models::user::AuthUser;
use crate::services::assessment_service::{is_open, AssessmentService};
use crate::services::grading_service::GradingService;
use crate::utils::time::{elapsed_secs, Clock};

pub const TIME_LIMIT_EXCEEDED: &str = "Assessment time limit exceeded";
pub const ALREADY_SUBMITTED: &str = "Assessment has already been submitted";

const ATTEMPT_COLUMNS: &str =
    "id, assessment_id, interviewee_id, answers, current_question, status, started_at, submitted_at";

/// Seconds left on an attempt, never negative.
pub fn time_remaining(assessment: &Assessment, attempt: &AssessmentAttempt, now: DateTime<Utc>) -> i64 {
    let limit = i64::from(assessment.duration.max(0)) * 60;
    (limit - elapsed_secs(attempt.started_at, now)).max(0)
}

/// Writes `answer` under the question id, replacing any earlier answer.
pub fn merge_answer(answers: &JsonValue, question_id: i32, answer: JsonValue) -> JsonValue {
    let mut map = answers.as_object().cloned().unwrap_or_default();
    map.insert(question_id.to_string(), answer);
    JsonValue::Object(map)
}

#[derive(Clone)]
pub struct AttemptService {
    pool: PgPool,
    assessments: AssessmentService,
    clock: Arc<dyn Clock>,
}

impl AttemptService {
    pub fn new(pool: PgPool, assessments: AssessmentService, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            assessments,
            clock,
        }
    }

    /// Starts the caller's attempt, or resumes the one already running.
    pub async fn start(&self, assessment_id: Uuid, user: &AuthUser) -> Result<AttemptView> {
        let assessment = self.assessments.find(assessment_id).await?;
        let now = self.clock.now();

        if let Some(existing) = self.find_for(assessment_id, user.id).await? {
            if existing.status == "submitted" {
                return Err(Error::BadRequest(ALREADY_SUBMITTED.into()));
            }
            let remaining = time_remaining(&assessment, &existing, now);
            return Ok(AttemptView::new(existing, remaining));
        }

        if !is_open(&assessment, now) {
            return Err(Error::BadRequest("This assessment is not available".into()));
        }

        let attempt = sqlx::query_as::<_, AssessmentAttempt>(&format!(
            r#"INSERT INTO assessment_attempts (assessment_id, interviewee_id, started_at)
               VALUES ($1, $2, $3)
               ON CONFLICT (assessment_id, interviewee_id) DO UPDATE SET assessment_id = EXCLUDED.assessment_id
               RETURNING {ATTEMPT_COLUMNS}"#
        ))
        .bind(assessment_id)
        .bind(user.id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        sqlx::query(
            "UPDATE invitations SET status = 'accepted' WHERE assessment_id = $1 AND interviewee_id = $2",
        )
        .bind(assessment_id)
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        tracing::info!(attempt_id = %attempt.id, assessment_id = %assessment_id, "assessment attempt started");
        let remaining = time_remaining(&assessment, &attempt, now);
        Ok(AttemptView::new(attempt, remaining))
    }

    pub async fn get(&self, attempt_id: Uuid, user: &AuthUser) -> Result<AttemptView> {
        let attempt = self.owned(attempt_id, user).await?;
        let assessment = self.assessments.find(attempt.assessment_id).await?;
        let remaining = time_remaining(&assessment, &attempt, self.clock.now());
        Ok(AttemptView::new(attempt, remaining))
    }

    /// The caller's attempt on an assessment. 404 when it was never started.
    pub async fn for_assessment(&self, assessment_id: Uuid, user: &AuthUser) -> Result<AttemptView> {
        let assessment = self.assessments.find(assessment_id).await?;
        let attempt = self
            .find_for(assessment_id, user.id)
            .await?
            .ok_or_else(|| Error::NotFound("No attempt for this assessment".into()))?;
        let remaining = time_remaining(&assessment, &attempt, self.clock.now());
        Ok(AttemptView::new(attempt, remaining))
    }

    pub async fn save_answer(
        &self,
        attempt_id: Uuid,
        user: &AuthUser,
        payload: SaveAnswerPayload,
    ) -> Result<AttemptView> {
        let attempt = self.owned(attempt_id, user).await?;
        if attempt.status != "in_progress" {
            return Err(Error::BadRequest(ALREADY_SUBMITTED.into()));
        }
        let assessment = self.assessments.find(attempt.assessment_id).await?;
        let now = self.clock.now();
        let remaining = time_remaining(&assessment, &attempt, now);
        if remaining == 0 {
            return Err(Error::BadRequest(TIME_LIMIT_EXCEEDED.into()));
        }
        let question_count = assessment.questions.as_array().map(Vec::len).unwrap_or(0);
        if payload.question_id as usize > question_count {
            return Err(Error::BadRequest(format!("Unknown question {}", payload.question_id)));
        }

        let answers = merge_answer(&attempt.answers, payload.question_id, payload.answer);
        let current = payload.next_question.unwrap_or(attempt.current_question);

        let updated = sqlx::query_as::<_, AssessmentAttempt>(&format!(
            r#"UPDATE assessment_attempts SET answers = $2, current_question = $3
               WHERE id = $1 AND status = 'in_progress'
               RETURNING {ATTEMPT_COLUMNS}"#
        ))
        .bind(attempt.id)
        .bind(answers)
        .bind(current)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::BadRequest(ALREADY_SUBMITTED.into()))?;

        Ok(AttemptView::new(updated, remaining))
    }

    /// Grades the attempt and opens its review. Late submissions are still accepted.
    pub async fn submit(&self, attempt_id: Uuid, user: &AuthUser) -> Result<SubmitAssessmentResponse> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;

        let attempt = Self::lock(&mut tx, attempt_id).await?;
        if attempt.interviewee_id != user.id {
            return Err(Error::Forbidden("This attempt belongs to someone else".into()));
        }
        if attempt.status == "submitted" {
            return Err(Error::BadRequest(ALREADY_SUBMITTED.into()));
        }

        let assessment = self.assessments.find(attempt.assessment_id).await?;
        let questions = assessment.parsed_questions()?;
        let (graded, needs_review) = GradingService::grade_assessment(&questions, &attempt.answers);
        let (earned, max) = GradingService::totals(&graded);
        let auto_score = GradingService::percentage(earned, max);

        sqlx::query("UPDATE assessment_attempts SET status = 'submitted', submitted_at = $2 WHERE id = $1")
            .bind(attempt.id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        // Nothing left for a human: the automatic score is final.
        let (final_score, passed, status) = if needs_review {
            (None, None, "pending")
        } else {
            (Some(auto_score), Some(auto_score >= assessment.passing_score), "completed")
        };

        let review_id: Uuid = sqlx::query_scalar(
            r#"INSERT INTO reviews (attempt_id, graded_answers, auto_score, final_score, passed, review_status)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id"#,
        )
        .bind(attempt.id)
        .bind(serde_json::to_value(&graded)?)
        .bind(auto_score)
        .bind(final_score)
        .bind(passed)
        .bind(status)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            attempt_id = %attempt.id,
            review_id = %review_id,
            earned,
            max,
            needs_review,
            "assessment submitted"
        );

        Ok(SubmitAssessmentResponse {
            attempt_id: attempt.id,
            review_id,
            status: "submitted".into(),
            auto_score: decimal_to_f64(auto_score),
            needs_review,
        })
    }

    /// Every attempt of the caller, scores hidden until released.
    pub async fn summary(&self, user: &AuthUser) -> Result<Vec<AttemptSummaryRow>> {
        let rows = sqlx::query_as::<_, AttemptSummaryRow>(
            r#"SELECT t.id AS attempt_id, t.assessment_id, a.title AS assessment_title, t.status,
                      t.started_at, t.submitted_at AS completed_at,
                      COALESCE(EXTRACT(EPOCH FROM (t.submitted_at - t.started_at)), 0)::bigint AS time_spent,
                      (r.id IS NOT NULL) AS has_review, r.review_status,
                      COALESCE(r.results_released, FALSE) AS results_released,
                      r.auto_score AS score, r.final_score, r.passed
               FROM assessment_attempts t
               JOIN assessments a ON a.id = t.assessment_id
               LEFT JOIN reviews r ON r.attempt_id = t.id
               WHERE t.interviewee_id = $1
               ORDER BY t.started_at DESC"#,
        )
        .bind(user.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AttemptSummaryRow::redact_unreleased).collect())
    }

    async fn find_for(&self, assessment_id: Uuid, interviewee_id: Uuid) -> Result<Option<AssessmentAttempt>> {
        let attempt = sqlx::query_as::<_, AssessmentAttempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM assessment_attempts WHERE assessment_id = $1 AND interviewee_id = $2"
        ))
        .bind(assessment_id)
        .bind(interviewee_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(attempt)
    }

    async fn owned(&self, attempt_id: Uuid, user: &AuthUser) -> Result<AssessmentAttempt> {
        let attempt = sqlx::query_as::<_, AssessmentAttempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM assessment_attempts WHERE id = $1"
        ))
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Attempt not found".into()))?;
        if attempt.interviewee_id != user.id {
            return Err(Error::Forbidden("This attempt belongs to someone else".into()));
        }
        Ok(attempt)
    }

    async fn lock(tx: &mut Transaction<'_, Postgres>, attempt_id: Uuid) -> Result<AssessmentAttempt> {
        sqlx::query_as::<_, AssessmentAttempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM assessment_attempts WHERE id = $1 FOR UPDATE"
        ))
        .bind(attempt_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| Error::NotFound("Attempt not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;

    fn fixtures(duration: i32) -> (Assessment, AssessmentAttempt) {
        let started = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let assessment = Assessment {
            id: Uuid::new_v4(),
            recruiter_id: Uuid::new_v4(),
            category_id: None,
            title: "Backend".into(),
            description: None,
            assessment_type: "technical".into(),
            difficulty: None,
            duration,
            passing_score: Decimal::from(70),
            instructions: None,
            tags: vec![],
            status: "active".into(),
            deadline: None,
            questions: json!([]),
            created_at: started,
            updated_at: started,
        };
        let attempt = AssessmentAttempt {
            id: Uuid::new_v4(),
            assessment_id: assessment.id,
            interviewee_id: Uuid::new_v4(),
            answers: json!({}),
            current_question: 0,
            status: "in_progress".into(),
            started_at: started,
            submitted_at: None,
        };
        (assessment, attempt)
    }

    #[test]
    fn remaining_time_counts_down_and_stops_at_zero() {
        let (assessment, attempt) = fixtures(30);
        let start = attempt.started_at;
        assert_eq!(time_remaining(&assessment, &attempt, start), 1800);
        assert_eq!(time_remaining(&assessment, &attempt, start + Duration::minutes(10)), 1200);
        assert_eq!(time_remaining(&assessment, &attempt, start + Duration::hours(2)), 0);
    }

    #[test]
    fn saving_again_overwrites_previous_answer() {
        let answers = merge_answer(&json!({"1": 0}), 2, json!("RAII"));
        let answers = merge_answer(&answers, 1, json!(3));
        assert_eq!(answers, json!({"1": 3, "2": "RAII"}));
    }

    #[test]
    fn non_object_answers_start_fresh() {
        assert_eq!(merge_answer(&JsonValue::Null, 1, json!(2)), json!({"1": 2}));
    }
}
