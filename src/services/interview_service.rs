use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::interview_dto::{
    split_name, CreateInterviewPayload, InterviewRow, InterviewView, SchedulableCandidate,
    UpdateInterviewPayload,
};
use crate::error::{Error, Result};
use crate::models::interview::{Interview, InterviewStatus};
use crate::models::user::{AuthUser, Role};
use crate::services::audit_service::AuditService;

const INTERVIEW_COLUMNS: &str = r#"
    id, recruiter_id, interviewee_id, assessment_id, position, interview_type, scheduled_at,
    duration, meeting_link, location, notes, status, created_at, updated_at
"#;

const VIEW_SELECT: &str = r#"
    SELECT i.id, i.recruiter_id, i.interviewee_id, i.assessment_id, a.title AS assessment_title,
           i.position, i.interview_type, i.scheduled_at, i.duration, i.meeting_link, i.location,
           i.notes, i.status, i.created_at,
           c.full_name AS interviewee_name, c.email AS interviewee_email,
           c.profile->>'avatar' AS interviewee_avatar, c.profile->>'position' AS interviewee_position,
           r.full_name AS recruiter_name, r.email AS recruiter_email,
           r.profile->>'avatar' AS recruiter_avatar, r.profile->>'company' AS recruiter_company
    FROM interviews i
    JOIN users c ON c.id = i.interviewee_id
    JOIN users r ON r.id = i.recruiter_id
    LEFT JOIN assessments a ON a.id = i.assessment_id
"#;

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validates a requested status change against the interview lifecycle.
pub fn check_transition(current: &str, requested: &str) -> Result<InterviewStatus> {
    let from = InterviewStatus::parse(current)
        .ok_or_else(|| Error::Internal(format!("stored interview status '{}' is invalid", current)))?;
    let to = InterviewStatus::parse(requested)
        .ok_or_else(|| Error::BadRequest(format!("Unknown interview status '{}'", requested)))?;
    if from != to && !from.can_transition_to(to) {
        return Err(Error::BadRequest(format!(
            "Cannot change interview from {} to {}",
            from.as_str(),
            to.as_str()
        )));
    }
    if from == to && from.is_terminal() {
        return Err(Error::BadRequest(format!("Interview is already {}", from.as_str())));
    }
    Ok(to)
}

#[derive(Clone)]
pub struct InterviewService {
    pool: PgPool,
    audit: AuditService,
}

impl InterviewService {
    pub fn new(pool: PgPool, audit: AuditService) -> Self {
        Self { pool, audit }
    }

    /// Recruiters see the interviews they run, interviewees the ones they attend.
    pub async fn list(&self, user: &AuthUser) -> Result<Vec<InterviewView>> {
        let filter = match user.role {
            Role::Admin => "WHERE $1::uuid IS NOT NULL",
            Role::Recruiter => "WHERE i.recruiter_id = $1",
            Role::Interviewee => "WHERE i.interviewee_id = $1",
        };
        let rows = sqlx::query_as::<_, InterviewRow>(&format!(
            "{VIEW_SELECT} {filter} ORDER BY i.scheduled_at ASC"
        ))
        .bind(user.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(InterviewView::from).collect())
    }

    pub async fn create(&self, payload: CreateInterviewPayload, user: &AuthUser) -> Result<InterviewView> {
        self.ensure_interviewee(payload.interviewee_id).await?;
        if let Some(assessment_id) = payload.assessment_id {
            self.ensure_assessment(assessment_id).await?;
        }

        let interview = sqlx::query_as::<_, Interview>(&format!(
            r#"INSERT INTO interviews (
                   recruiter_id, interviewee_id, assessment_id, position, interview_type,
                   scheduled_at, duration, meeting_link, location, notes
               ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
               RETURNING {INTERVIEW_COLUMNS}"#
        ))
        .bind(user.id)
        .bind(payload.interviewee_id)
        .bind(payload.assessment_id)
        .bind(payload.position.trim())
        .bind(payload.interview_type.to_ascii_lowercase())
        .bind(payload.scheduled_at)
        .bind(payload.duration.unwrap_or(60))
        .bind(blank_to_none(payload.meeting_link))
        .bind(blank_to_none(payload.location))
        .bind(blank_to_none(payload.notes))
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(interview_id = %interview.id, scheduled_at = %interview.scheduled_at, "interview scheduled");
        self.view(interview.id).await
    }

    pub async fn update(&self, id: Uuid, payload: UpdateInterviewPayload, user: &AuthUser) -> Result<InterviewView> {
        let current = self.owned(id, user).await?;

        let status = match payload.status.as_deref() {
            Some(requested) => check_transition(&current.status, requested)?.as_str().to_string(),
            None => current.status.clone(),
        };
        if let Some(assessment_id) = payload.assessment_id {
            self.ensure_assessment(assessment_id).await?;
        }

        sqlx::query(
            r#"UPDATE interviews SET
                   position = $2, interview_type = $3, scheduled_at = $4, duration = $5,
                   meeting_link = $6, location = $7, notes = $8, assessment_id = $9,
                   status = $10, updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(payload.position.map(|p| p.trim().to_string()).unwrap_or(current.position))
        .bind(
            payload
                .interview_type
                .map(|t| t.to_ascii_lowercase())
                .unwrap_or(current.interview_type),
        )
        .bind(payload.scheduled_at.unwrap_or(current.scheduled_at))
        .bind(payload.duration.unwrap_or(current.duration))
        .bind(match payload.meeting_link {
            Some(v) => blank_to_none(Some(v)),
            None => current.meeting_link,
        })
        .bind(match payload.location {
            Some(v) => blank_to_none(Some(v)),
            None => current.location,
        })
        .bind(match payload.notes {
            Some(v) => blank_to_none(Some(v)),
            None => current.notes,
        })
        .bind(payload.assessment_id.or(current.assessment_id))
        .bind(&status)
        .execute(&self.pool)
        .await?;

        if status != current.status {
            tracing::info!(interview_id = %id, from = %current.status, to = %status, "interview status changed");
        }
        self.view(id).await
    }

    pub async fn delete(&self, id: Uuid, user: &AuthUser) -> Result<()> {
        let interview = self.owned(id, user).await?;
        sqlx::query("DELETE FROM interviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.audit
            .record(
                user.id,
                "interview_deleted",
                "interview",
                id,
                Some(serde_json::json!({
                    "interviewee_id": interview.interviewee_id,
                    "scheduled_at": interview.scheduled_at,
                })),
            )
            .await;
        Ok(())
    }

    pub async fn candidates(&self) -> Result<Vec<SchedulableCandidate>> {
        #[derive(sqlx::FromRow)]
        struct Row {
            id: Uuid,
            full_name: String,
            email: String,
            position: Option<String>,
        }

        let rows = sqlx::query_as::<_, Row>(
            r#"SELECT id, full_name, email, profile->>'position' AS position
               FROM users WHERE role = 'interviewee' ORDER BY full_name"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let (first_name, last_name) = split_name(&r.full_name);
                SchedulableCandidate {
                    id: r.id,
                    first_name,
                    last_name,
                    email: r.email,
                    position: r.position,
                }
            })
            .collect())
    }

    async fn view(&self, id: Uuid) -> Result<InterviewView> {
        let row = sqlx::query_as::<_, InterviewRow>(&format!("{VIEW_SELECT} WHERE i.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Interview not found".into()))?;
        Ok(row.into())
    }

    async fn owned(&self, id: Uuid, user: &AuthUser) -> Result<Interview> {
        let interview = sqlx::query_as::<_, Interview>(&format!(
            "SELECT {INTERVIEW_COLUMNS} FROM interviews WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Interview not found".into()))?;
        if !user.may_manage(interview.recruiter_id) {
            return Err(Error::Forbidden("You do not own this interview".into()));
        }
        Ok(interview)
    }

    async fn ensure_interviewee(&self, id: Uuid) -> Result<()> {
        let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match role.as_deref() {
            Some("interviewee") => Ok(()),
            Some(_) => Err(Error::BadRequest("Selected user is not an interviewee".into())),
            None => Err(Error::BadRequest("Interviewee does not exist".into())),
        }
    }

    async fn ensure_assessment(&self, id: Uuid) -> Result<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM assessments WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(Error::BadRequest("Assessment does not exist".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_moves_forward_only() {
        assert_eq!(check_transition("scheduled", "confirmed").unwrap(), InterviewStatus::Confirmed);
        assert_eq!(check_transition("confirmed", "completed").unwrap(), InterviewStatus::Completed);
        assert!(check_transition("confirmed", "scheduled").is_err());
    }

    #[test]
    fn terminal_interviews_cannot_change() {
        assert!(check_transition("cancelled", "scheduled").is_err());
        assert!(check_transition("completed", "completed").is_err());
    }

    #[test]
    fn same_status_is_a_no_op_while_open() {
        assert_eq!(check_transition("scheduled", "scheduled").unwrap(), InterviewStatus::Scheduled);
    }

    #[test]
    fn unknown_status_is_bad_request() {
        let err = check_transition("scheduled", "postponed").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn blank_optional_fields_are_dropped() {
        assert_eq!(blank_to_none(Some("  ".into())), None);
        assert_eq!(blank_to_none(Some(" room 4 ".into())), Some("room 4".into()));
    }
}
