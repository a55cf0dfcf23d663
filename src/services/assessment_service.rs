use chrono::{DateTime, Utc};
use serde_json::{json, Value as JsonValue};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::ValidateEmail;

use crate::dto::assessment_dto::{
    AssessmentPayload, AssessmentResponse, InvitationView, InviteReport, ResultRow, SendInvitePayload,
};
use crate::error::{Error, Result};
use crate::models::assessment::{Assessment, Invitation};
use crate::models::user::AuthUser;
use crate::services::audit_service::AuditService;

pub(crate) const ASSESSMENT_COLUMNS: &str = r#"
    id, recruiter_id, category_id, title, description, assessment_type, difficulty, duration,
    passing_score, instructions, tags, status, deadline, questions, created_at, updated_at
"#;

const INVITATION_VIEW_SELECT: &str = r#"
    SELECT i.id, i.assessment_id, a.title AS assessment_title, a.duration AS assessment_duration,
           i.interviewee_id, u.full_name AS interviewee_name, u.email AS interviewee_email,
           r.profile->>'company' AS company_name, i.status, i.message, i.invited_at,
           a.deadline AS expires_at
    FROM invitations i
    JOIN assessments a ON a.id = i.assessment_id
    JOIN users u ON u.id = i.interviewee_id
    JOIN users r ON r.id = a.recruiter_id
"#;

/// True when the assessment can still be taken at `now`.
pub fn is_open(assessment: &Assessment, now: DateTime<Utc>) -> bool {
    assessment.is_active() && assessment.deadline.map_or(true, |d| d > now)
}

#[derive(Clone)]
pub struct AssessmentService {
    pool: PgPool,
    audit: AuditService,
}

impl AssessmentService {
    pub fn new(pool: PgPool, audit: AuditService) -> Self {
        Self { pool, audit }
    }

    pub async fn list(&self, user: &AuthUser) -> Result<Vec<AssessmentResponse>> {
        #[derive(FromRow)]
        struct Row {
            #[sqlx(flatten)]
            assessment: Assessment,
            candidates: i64,
        }

        let rows = sqlx::query_as::<_, Row>(
            r#"SELECT a.id, a.recruiter_id, a.category_id, a.title, a.description, a.assessment_type,
                      a.difficulty, a.duration, a.passing_score, a.instructions, a.tags, a.status,
                      a.deadline, a.questions, a.created_at, a.updated_at,
                      (SELECT COUNT(*) FROM assessment_attempts t WHERE t.assessment_id = a.id) AS candidates
               FROM assessments a
               WHERE $1 OR a.recruiter_id = $2
               ORDER BY a.created_at DESC"#,
        )
        .bind(user.is_admin())
        .bind(user.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| AssessmentResponse::new(r.assessment, r.candidates))
            .collect())
    }

    pub async fn find(&self, id: Uuid) -> Result<Assessment> {
        sqlx::query_as::<_, Assessment>(&format!(
            "SELECT {ASSESSMENT_COLUMNS} FROM assessments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Assessment not found".into()))
    }

    /// Loads an assessment the caller is allowed to manage.
    pub async fn get_owned(&self, id: Uuid, user: &AuthUser) -> Result<Assessment> {
        let assessment = self.find(id).await?;
        if !user.may_manage(assessment.recruiter_id) {
            return Err(Error::Forbidden("You do not own this assessment".into()));
        }
        Ok(assessment)
    }

    pub async fn get(&self, id: Uuid, user: &AuthUser) -> Result<AssessmentResponse> {
        let assessment = self.get_owned(id, user).await?;
        let candidates = self.attempt_count(id).await?;
        Ok(AssessmentResponse::new(assessment, candidates))
    }

    pub async fn create(&self, payload: AssessmentPayload, user: &AuthUser) -> Result<AssessmentResponse> {
        let questions = payload.checked_questions()?;
        let deadline = payload.deadline_at()?;
        self.ensure_category(payload.category_id).await?;

        let assessment = sqlx::query_as::<_, Assessment>(&format!(
            r#"INSERT INTO assessments (
                   recruiter_id, category_id, title, description, assessment_type, difficulty,
                   duration, passing_score, instructions, tags, status, deadline, questions
               ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
               RETURNING {ASSESSMENT_COLUMNS}"#
        ))
        .bind(user.id)
        .bind(payload.category_id)
        .bind(payload.title.trim())
        .bind(&payload.description)
        .bind(payload.assessment_type.as_deref().unwrap_or("technical"))
        .bind(&payload.difficulty)
        .bind(payload.duration.unwrap_or(60))
        .bind(payload.passing_score_decimal())
        .bind(&payload.instructions)
        .bind(&payload.tags)
        .bind(payload.status_or_default())
        .bind(deadline)
        .bind(serde_json::to_value(&questions)?)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            assessment_id = %assessment.id,
            status = %assessment.status,
            questions = questions.len(),
            "assessment created"
        );
        Ok(AssessmentResponse::new(assessment, 0))
    }

    pub async fn update(&self, id: Uuid, payload: AssessmentPayload, user: &AuthUser) -> Result<AssessmentResponse> {
        self.get_owned(id, user).await?;
        let questions = payload.checked_questions()?;
        let deadline = payload.deadline_at()?;
        self.ensure_category(payload.category_id).await?;

        let assessment = sqlx::query_as::<_, Assessment>(&format!(
            r#"UPDATE assessments SET
                   category_id = $2, title = $3, description = $4, assessment_type = $5,
                   difficulty = $6, duration = $7, passing_score = $8, instructions = $9,
                   tags = $10, status = $11, deadline = $12, questions = $13, updated_at = NOW()
               WHERE id = $1
               RETURNING {ASSESSMENT_COLUMNS}"#
        ))
        .bind(id)
        .bind(payload.category_id)
        .bind(payload.title.trim())
        .bind(&payload.description)
        .bind(payload.assessment_type.as_deref().unwrap_or("technical"))
        .bind(&payload.difficulty)
        .bind(payload.duration.unwrap_or(60))
        .bind(payload.passing_score_decimal())
        .bind(&payload.instructions)
        .bind(&payload.tags)
        .bind(payload.status_or_default())
        .bind(deadline)
        .bind(serde_json::to_value(&questions)?)
        .fetch_one(&self.pool)
        .await?;

        let candidates = self.attempt_count(id).await?;
        Ok(AssessmentResponse::new(assessment, candidates))
    }

    pub async fn delete(&self, id: Uuid, user: &AuthUser) -> Result<Assessment> {
        let assessment = self.get_owned(id, user).await?;
        sqlx::query("DELETE FROM assessments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        tracing::info!(assessment_id = %id, "assessment deleted");
        self.audit
            .record(
                user.id,
                "assessment_deleted",
                "assessment",
                id,
                Some(json!({ "title": assessment.title, "status": assessment.status })),
            )
            .await;
        Ok(assessment)
    }

    pub async fn results(&self, id: Uuid, user: &AuthUser) -> Result<Vec<ResultRow>> {
        self.get_owned(id, user).await?;
        let rows = sqlx::query_as::<_, ResultRow>(
            r#"SELECT t.id AS attempt_id, u.id AS candidate_id, u.full_name AS candidate_name,
                      u.email, u.profile->>'avatar' AS avatar, t.status, t.started_at,
                      t.submitted_at AS completed_at,
                      COALESCE(EXTRACT(EPOCH FROM (t.submitted_at - t.started_at)), 0)::bigint AS time_spent,
                      r.id AS review_id, r.review_status,
                      COALESCE(r.final_score, r.auto_score) AS score,
                      r.passed, r.results_released
               FROM assessment_attempts t
               JOIN users u ON u.id = t.interviewee_id
               LEFT JOIN reviews r ON r.attempt_id = t.id
               WHERE t.assessment_id = $1
               ORDER BY t.started_at DESC"#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Records invitations for known interviewees. Nothing is mailed.
    pub async fn send_invites(&self, payload: SendInvitePayload, user: &AuthUser) -> Result<InviteReport> {
        let assessment = self.get_owned(payload.assessment_id, user).await?;
        if !assessment.is_active() {
            return Err(Error::BadRequest("Only published assessments can be sent".into()));
        }

        let mut report = InviteReport::default();
        let message = payload
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());

        for email in payload.email.addresses() {
            if !email.validate_email() {
                report.invalid_emails.push(email);
                continue;
            }
            let interviewee: Option<Uuid> = sqlx::query_scalar(
                "SELECT id FROM users WHERE LOWER(email) = $1 AND role = 'interviewee'",
            )
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;
            let Some(interviewee_id) = interviewee else {
                report.unknown_emails.push(email);
                continue;
            };

            let inserted = sqlx::query(
                r#"INSERT INTO invitations (assessment_id, interviewee_id, message)
                   VALUES ($1, $2, $3)
                   ON CONFLICT (assessment_id, interviewee_id) DO NOTHING"#,
            )
            .bind(assessment.id)
            .bind(interviewee_id)
            .bind(message)
            .execute(&self.pool)
            .await?;

            if inserted.rows_affected() == 0 {
                report.already_invited.push(email);
            } else {
                report.invited.push(email);
            }
        }

        tracing::info!(
            assessment_id = %assessment.id,
            invited = report.invited.len(),
            unknown = report.unknown_emails.len(),
            "invitations recorded"
        );
        Ok(report)
    }

    /// Interviewees see their own invitations, recruiters the ones they sent.
    pub async fn list_invitations(&self, user: &AuthUser) -> Result<Vec<InvitationView>> {
        let filter = if user.is_admin() {
            "WHERE $1::uuid IS NOT NULL"
        } else if user.role.can_recruit() {
            "WHERE a.recruiter_id = $1"
        } else {
            "WHERE i.interviewee_id = $1"
        };
        let rows = sqlx::query_as::<_, InvitationView>(&format!(
            "{INVITATION_VIEW_SELECT} {filter} ORDER BY i.invited_at DESC"
        ))
        .bind(user.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn accept_invitation(&self, id: Uuid, user: &AuthUser) -> Result<Invitation> {
        let invitation = self.invitation_for(id, user.id).await?;
        let updated = sqlx::query_as::<_, Invitation>(
            r#"UPDATE invitations SET status = 'accepted'
               WHERE id = $1
               RETURNING id, assessment_id, interviewee_id, status, message, invited_at"#,
        )
        .bind(invitation.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    /// The assessment as the candidate takes it, answers removed.
    pub async fn candidate_view(
        &self,
        id: Uuid,
        user: &AuthUser,
        invitation_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<JsonValue> {
        let assessment = self.find(id).await?;
        let invitation = match invitation_id {
            Some(inv) => {
                let invitation = self.invitation_for(inv, user.id).await?;
                if invitation.assessment_id != id {
                    return Err(Error::BadRequest("Invitation does not match this assessment".into()));
                }
                Some(invitation)
            }
            None => None,
        };
        if !is_open(&assessment, now) {
            return Err(Error::BadRequest("This assessment is not available".into()));
        }
        let mut value = self.candidate_json(&assessment)?;
        if let (Some(map), Some(inv)) = (value.as_object_mut(), invitation) {
            map.insert("invitation_id".into(), json!(inv.id));
            map.insert("invitation_status".into(), json!(inv.status));
            map.insert("message".into(), json!(inv.message));
        }
        Ok(value)
    }

    /// Published, unexpired assessments with the caller's attempt state.
    pub async fn available(&self, user: &AuthUser, now: DateTime<Utc>) -> Result<Vec<JsonValue>> {
        #[derive(FromRow)]
        struct Row {
            #[sqlx(flatten)]
            assessment: Assessment,
            company: Option<String>,
            attempt_id: Option<Uuid>,
            attempt_status: Option<String>,
            results_released: Option<bool>,
            final_score: Option<rust_decimal::Decimal>,
        }

        let rows = sqlx::query_as::<_, Row>(
            r#"SELECT a.id, a.recruiter_id, a.category_id, a.title, a.description, a.assessment_type,
                      a.difficulty, a.duration, a.passing_score, a.instructions, a.tags, a.status,
                      a.deadline, a.questions, a.created_at, a.updated_at,
                      r.profile->>'company' AS company,
                      t.id AS attempt_id, t.status AS attempt_status,
                      rv.results_released, rv.final_score
               FROM assessments a
               JOIN users r ON r.id = a.recruiter_id
               LEFT JOIN assessment_attempts t ON t.assessment_id = a.id AND t.interviewee_id = $1
               LEFT JOIN reviews rv ON rv.attempt_id = t.id
               WHERE a.status = 'active' AND (a.deadline IS NULL OR a.deadline > $2)
               ORDER BY a.created_at DESC"#,
        )
        .bind(user.id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut value = self.candidate_json(&row.assessment)?;
            if let Some(map) = value.as_object_mut() {
                let released = row.results_released.unwrap_or(false);
                map.insert("company".into(), json!(row.company));
                map.insert("skills".into(), json!(row.assessment.tags));
                map.insert("attempt_id".into(), json!(row.attempt_id));
                map.insert(
                    "status".into(),
                    json!(row.attempt_status.as_deref().unwrap_or("available")),
                );
                map.insert("attempts".into(), json!(if row.attempt_id.is_some() { 1 } else { 0 }));
                map.insert(
                    "score".into(),
                    json!(row
                        .final_score
                        .filter(|_| released)
                        .map(crate::dto::assessment_dto::decimal_to_f64)),
                );
            }
            out.push(value);
        }
        Ok(out)
    }

    fn candidate_json(&self, assessment: &Assessment) -> Result<JsonValue> {
        let questions: Vec<JsonValue> = assessment
            .parsed_questions()?
            .iter()
            .map(|q| q.candidate_view())
            .collect();
        Ok(json!({
            "id": assessment.id,
            "title": assessment.title,
            "description": assessment.description,
            "type": assessment.assessment_type,
            "difficulty": assessment.difficulty,
            "duration": assessment.duration,
            "passing_score": crate::dto::assessment_dto::decimal_to_f64(assessment.passing_score),
            "instructions": assessment.instructions,
            "tags": assessment.tags,
            "deadline": assessment.deadline,
            "question_count": questions.len(),
            "questions": questions,
        }))
    }

    async fn invitation_for(&self, id: Uuid, interviewee_id: Uuid) -> Result<Invitation> {
        let invitation = sqlx::query_as::<_, Invitation>(
            "SELECT id, assessment_id, interviewee_id, status, message, invited_at FROM invitations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Invitation not found".into()))?;
        if invitation.interviewee_id != interviewee_id {
            return Err(Error::Forbidden("This invitation was sent to someone else".into()));
        }
        Ok(invitation)
    }

    async fn attempt_count(&self, id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM assessment_attempts WHERE assessment_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn ensure_category(&self, category_id: Option<Uuid>) -> Result<()> {
        let Some(category_id) = category_id else {
            return Ok(());
        };
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
            .bind(category_id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(Error::BadRequest("Category does not exist".into()));
        }
        Ok(())
    }
}
