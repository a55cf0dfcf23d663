use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::feedback_dto::{CreateFeedbackPayload, FeedbackStats, FeedbackView, UpdateFeedbackPayload};
use crate::error::{Error, Result};
use crate::models::feedback::Feedback;
use crate::models::user::AuthUser;

const FEEDBACK_COLUMNS: &str = r#"
    id, interviewee_id, subject, message, feedback_type, rating, status, priority, admin_notes,
    created_at, updated_at
"#;

const VIEW_SELECT: &str = r#"
    SELECT f.id, f.interviewee_id, u.full_name AS interviewee_name, u.email AS interviewee_email,
           f.feedback_type, f.subject, f.message, f.rating, f.status, f.priority, f.admin_notes,
           f.created_at, f.updated_at
    FROM feedback f
    JOIN users u ON u.id = f.interviewee_id
"#;

#[derive(Clone)]
pub struct FeedbackService {
    pool: PgPool,
}

impl FeedbackService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, payload: CreateFeedbackPayload, user: &AuthUser) -> Result<Feedback> {
        let feedback = sqlx::query_as::<_, Feedback>(&format!(
            r#"INSERT INTO feedback (interviewee_id, subject, message, feedback_type, rating)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {FEEDBACK_COLUMNS}"#
        ))
        .bind(user.id)
        .bind(payload.subject.trim())
        .bind(payload.message.trim())
        .bind(payload.feedback_type.to_ascii_lowercase())
        .bind(payload.rating)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(feedback_id = %feedback.id, feedback_type = %feedback.feedback_type, "feedback submitted");
        Ok(feedback)
    }

    /// Recruiters see everything, interviewees their own submissions.
    pub async fn list(&self, user: &AuthUser) -> Result<Vec<FeedbackView>> {
        let filter = if user.role.can_recruit() {
            "WHERE $1::uuid IS NOT NULL"
        } else {
            "WHERE f.interviewee_id = $1"
        };
        let rows = sqlx::query_as::<_, FeedbackView>(&format!(
            "{VIEW_SELECT} {filter} ORDER BY f.created_at DESC"
        ))
        .bind(user.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn update(&self, id: Uuid, payload: UpdateFeedbackPayload) -> Result<FeedbackView> {
        let updated = sqlx::query(
            r#"UPDATE feedback SET
                   status = COALESCE($2, status),
                   priority = COALESCE($3, priority),
                   admin_notes = COALESCE($4, admin_notes),
                   updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(payload.status.map(|s| s.to_ascii_lowercase()))
        .bind(payload.priority.map(|p| p.to_ascii_lowercase()))
        .bind(payload.admin_notes.map(|n| n.trim().to_string()))
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(Error::NotFound("Feedback not found".into()));
        }

        let view = sqlx::query_as::<_, FeedbackView>(&format!("{VIEW_SELECT} WHERE f.id = $1"))
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(view)
    }

    pub async fn stats(&self, now: DateTime<Utc>) -> Result<FeedbackStats> {
        let stats = sqlx::query_as::<_, FeedbackStats>(
            r#"SELECT COUNT(*) AS total_feedback,
                      COUNT(*) FILTER (WHERE status = 'pending') AS pending_feedback,
                      COUNT(*) FILTER (WHERE status = 'reviewed') AS reviewed_feedback,
                      COUNT(*) FILTER (WHERE status = 'resolved') AS resolved_feedback,
                      COUNT(*) FILTER (WHERE created_at >= $1) AS recent_feedback
               FROM feedback"#,
        )
        .bind(now - Duration::days(7))
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}
