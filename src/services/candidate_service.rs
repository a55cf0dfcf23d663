use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::candidate_dto::{CandidateRow, CandidateSummary};
use crate::error::{Error, Result};
use crate::models::user::AuthUser;

#[derive(Clone)]
pub struct CandidateService {
    pool: PgPool,
}

impl CandidateService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All interviewees with their activity. Pipeline status is per recruiter.
    pub async fn list(&self, user: &AuthUser) -> Result<Vec<CandidateSummary>> {
        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT u.id, u.full_name, u.email, u.profile, p.status,
                   (SELECT COUNT(*) FROM assessment_attempts t WHERE t.interviewee_id = u.id) AS assessments_total,
                   (SELECT COUNT(*) FROM assessment_attempts t
                     WHERE t.interviewee_id = u.id AND t.status = 'submitted') AS assessments_completed,
                   (SELECT COUNT(DISTINCT pa.problem_id) FROM practice_attempts pa
                     WHERE pa.user_id = u.id AND pa.passed) AS practice_completed,
                   (SELECT COUNT(*) FROM interviews i WHERE i.interviewee_id = u.id) AS interviews_total,
                   (SELECT COUNT(*) FROM interviews i
                     WHERE i.interviewee_id = u.id AND i.status = 'completed') AS interviews_completed,
                   (SELECT COUNT(*) FROM interviews i
                     WHERE i.interviewee_id = u.id AND i.status IN ('scheduled', 'confirmed')) AS interviews_scheduled,
                   (SELECT AVG(COALESCE(r.final_score, r.auto_score)) FROM reviews r
                     JOIN assessment_attempts t ON t.id = r.attempt_id
                     WHERE t.interviewee_id = u.id) AS average_score,
                   GREATEST(
                       (SELECT MAX(t.started_at) FROM assessment_attempts t WHERE t.interviewee_id = u.id),
                       (SELECT MAX(pa.created_at) FROM practice_attempts pa WHERE pa.user_id = u.id)
                   ) AS last_activity
            FROM users u
            LEFT JOIN candidate_pipeline p ON p.candidate_id = u.id AND p.recruiter_id = $1
            WHERE u.role = 'interviewee'
            ORDER BY u.full_name
            "#,
        )
        .bind(user.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CandidateSummary::from).collect())
    }

    pub async fn set_status(&self, candidate_id: Uuid, status: &str, user: &AuthUser) -> Result<String> {
        let is_interviewee: Option<bool> =
            sqlx::query_scalar("SELECT role = 'interviewee' FROM users WHERE id = $1")
                .bind(candidate_id)
                .fetch_optional(&self.pool)
                .await?;
        match is_interviewee {
            Some(true) => {}
            Some(false) => return Err(Error::BadRequest("User is not a candidate".into())),
            None => return Err(Error::NotFound("Candidate not found".into())),
        }

        let status = status.to_ascii_lowercase();
        sqlx::query(
            r#"INSERT INTO candidate_pipeline (recruiter_id, candidate_id, status)
               VALUES ($1, $2, $3)
               ON CONFLICT (recruiter_id, candidate_id)
               DO UPDATE SET status = EXCLUDED.status, updated_at = NOW()"#,
        )
        .bind(user.id)
        .bind(candidate_id)
        .bind(&status)
        .execute(&self.pool)
        .await?;

        tracing::info!(candidate_id = %candidate_id, status = %status, "candidate pipeline status updated");
        Ok(status)
    }
}
