use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value as JsonValue};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::dto::practice_dto::problem_json;
use crate::dto::session_dto::{
    PracticeCategoryResponse, SessionProgress, SessionView, SubmitProblemPayload,
    SubmitProblemResponse,
};
use crate::error::{Error, Result};
use crate::models::category::Category;
use crate::models::category_session::{CategorySession, SessionStatus};
use crate::models::practice_attempt::AttemptSummary;
use crate::models::problem::Problem;
use crate::services::practice_service::{NewAttempt, PracticeService, Submission, PROBLEM_COLUMNS};
use crate::services::session_rules::{self, ProblemAction};
use crate::utils::time::Clock;

pub const ALREADY_ATTEMPTED: &str = "Problem already attempted in this session";
pub const NOT_IN_PROGRESS: &str = "Session is not in progress";
pub const TIME_EXCEEDED: &str = "Session time limit exceeded";
pub const NOT_IN_SESSION: &str = "Problem is not part of this session";
pub const PROBLEM_LOCKED: &str = "Problem is locked";
pub const NO_ATTEMPTS_LEFT: &str = "No attempts left for this problem";
pub const EMPTY_CATEGORY: &str = "Category has no practice problems";

const SESSION_COLUMNS: &str = r#"
    id, user_id, category_id, problem_ids, total_problems, max_score, time_limit, started_at,
    problems_completed, total_score, status, completed_at
"#;

/// Per-problem state as the session page renders it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemState {
    pub problem_id: Uuid,
    pub completed: bool,
    pub passed: bool,
    pub available: bool,
    pub attempt_count: i64,
    pub best_score: Option<i32>,
    pub action: ProblemAction,
}

/// Works out availability and actions for problems in session order.
pub fn problem_states(problems: &[Problem], summaries: &HashMap<Uuid, AttemptSummary>) -> Vec<ProblemState> {
    let completed: Vec<bool> = problems
        .iter()
        .map(|p| summaries.get(&p.id).is_some_and(|s| s.attempt_count > 0))
        .collect();

    problems
        .iter()
        .enumerate()
        .map(|(idx, p)| {
            let summary = summaries.get(&p.id);
            let attempt_count = summary.map(|s| s.attempt_count).unwrap_or(0);
            let passed = summary.is_some_and(|s| s.ever_passed);
            let available = session_rules::is_available(idx, &completed);
            ProblemState {
                problem_id: p.id,
                completed: completed[idx],
                passed,
                available,
                attempt_count,
                best_score: summary.filter(|s| s.attempt_count > 0).map(|s| s.best_score),
                action: session_rules::problem_action(
                    available,
                    completed[idx],
                    passed,
                    attempt_count,
                    p.max_attempts,
                ),
            }
        })
        .collect()
}

pub fn progress(session: &CategorySession, now: DateTime<Utc>) -> SessionProgress {
    let status = session.state();
    let (time_spent, time_remaining) = match (status, session.completed_at) {
        (SessionStatus::InProgress, _) | (_, None) => (
            session_rules::time_spent(session.time_limit, session.started_at, now),
            session_rules::time_remaining(session.time_limit, session.started_at, now),
        ),
        (_, Some(done)) => (
            session_rules::time_spent(session.time_limit, session.started_at, done),
            session_rules::time_remaining(session.time_limit, session.started_at, done),
        ),
    };
    SessionProgress {
        problems_completed: session.problems_completed,
        total_problems: session.total_problems,
        total_score: session.total_score,
        max_score: session.max_score,
        time_spent,
        time_remaining: if status == SessionStatus::Timeout { 0 } else { time_remaining },
        status: status.as_str().to_string(),
    }
}

#[derive(Clone)]
pub struct SessionService {
    pool: PgPool,
    practice: PracticeService,
    clock: Arc<dyn Clock>,
}

impl SessionService {
    pub fn new(pool: PgPool, practice: PracticeService, clock: Arc<dyn Clock>) -> Self {
        Self { pool, practice, clock }
    }

    pub async fn list_practice_categories(&self, user_id: Uuid) -> Result<Vec<PracticeCategoryResponse>> {
        #[derive(FromRow)]
        struct Row {
            id: Uuid,
            name: String,
            description: Option<String>,
            total_problems: i64,
            total_points: i64,
            session_id: Option<Uuid>,
            session_status: Option<String>,
            problems_completed: Option<i32>,
        }

        let rows = sqlx::query_as::<_, Row>(
            r#"SELECT c.id, c.name, c.description,
                      COUNT(p.id) AS total_problems,
                      COALESCE(SUM(p.points), 0)::bigint AS total_points,
                      s.id AS session_id, s.status AS session_status, s.problems_completed
               FROM categories c
               JOIN practice_problems p ON p.category_id = c.id AND p.is_public = TRUE
               LEFT JOIN LATERAL (
                   SELECT id, status, problems_completed
                   FROM category_sessions
                   WHERE user_id = $1 AND category_id = c.id
                   ORDER BY started_at DESC
                   LIMIT 1
               ) s ON TRUE
               GROUP BY c.id, c.name, c.description, s.id, s.status, s.problems_completed
               ORDER BY c.name"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| PracticeCategoryResponse {
                id: r.id,
                name: r.name,
                description: r.description,
                total_problems: r.total_problems,
                total_points: r.total_points,
                session_status: r.session_status,
                session_id: r.session_id,
                problems_completed: r.problems_completed,
            })
            .collect())
    }

    /// Resumes the caller's running session for the category, or starts a new one.
    /// The flag is true when a new session was created.
    pub async fn start(&self, user_id: Uuid, category_id: Uuid) -> Result<(SessionView, bool)> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, description, created_by, created_at, updated_at FROM categories WHERE id = $1",
        )
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Category not found".into()))?;

        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text), hashtext($2::text))")
            .bind(user_id)
            .bind(category_id)
            .execute(&mut *tx)
            .await?;

        let existing = sqlx::query_as::<_, CategorySession>(&format!(
            r#"SELECT {SESSION_COLUMNS} FROM category_sessions
               WHERE user_id = $1 AND category_id = $2 AND status = 'in_progress'
               ORDER BY started_at DESC LIMIT 1
               FOR UPDATE"#
        ))
        .bind(user_id)
        .bind(category_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(session) = existing {
            if !session_rules::is_expired(session.time_limit, session.started_at, now) {
                tx.commit().await?;
                tracing::info!(session_id = %session.id, "category session resumed");
                let session = self.reconcile(session, now).await?;
                return self.view(session, &category, now).await.map(|v| (v, false));
            }
            Self::mark_timeout(&mut tx, &session).await?;
        }

        let problems = sqlx::query_as::<_, Problem>(&format!(
            r#"SELECT {PROBLEM_COLUMNS} FROM practice_problems
               WHERE category_id = $1 AND is_public = TRUE
               ORDER BY CASE difficulty WHEN 'Easy' THEN 0 WHEN 'Medium' THEN 1 ELSE 2 END, created_at"#
        ))
        .bind(category_id)
        .fetch_all(&mut *tx)
        .await?;
        if problems.is_empty() {
            return Err(Error::BadRequest(EMPTY_CATEGORY.into()));
        }

        let problem_ids: Vec<Uuid> = problems.iter().map(|p| p.id).collect();
        let time_limit: i32 = problems.iter().map(|p| p.time_budget_minutes() * 60).sum();
        let max_score: i32 = problems.iter().map(|p| p.points).sum();

        let session = sqlx::query_as::<_, CategorySession>(&format!(
            r#"INSERT INTO category_sessions (user_id, category_id, problem_ids, total_problems, max_score, time_limit, started_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING {SESSION_COLUMNS}"#
        ))
        .bind(user_id)
        .bind(category_id)
        .bind(&problem_ids)
        .bind(problem_ids.len() as i32)
        .bind(max_score)
        .bind(time_limit)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let session = Self::refresh_progress(&mut tx, &session, now).await?;
        tx.commit().await?;

        tracing::info!(
            session_id = %session.id,
            category_id = %category_id,
            total_problems = session.total_problems,
            time_limit = session.time_limit,
            "category session started"
        );
        self.view(session, &category, now).await.map(|v| (v, true))
    }

    pub async fn get(&self, user_id: Uuid, session_id: Uuid) -> Result<SessionView> {
        let mut session = self.load_owned(user_id, session_id).await?;
        let now = self.clock.now();
        if session.state() == SessionStatus::InProgress
            && session_rules::is_expired(session.time_limit, session.started_at, now)
        {
            let mut tx = self.pool.begin().await?;
            if let Some(updated) = Self::mark_timeout(&mut tx, &session).await? {
                session = updated;
            }
            tx.commit().await?;
        }
        let session = self.reconcile(session, now).await?;

        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, description, created_by, created_at, updated_at FROM categories WHERE id = $1",
        )
        .bind(session.category_id)
        .fetch_one(&self.pool)
        .await?;
        self.view(session, &category, now).await
    }

    pub async fn submit(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        payload: SubmitProblemPayload,
    ) -> Result<SubmitProblemResponse> {
        let session = self.load_owned(user_id, session_id).await?;
        let now = self.clock.now();
        let session = self.reconcile(session, now).await?;
        self.check_submittable(&session, payload.problem_id, user_id, now).await?;

        let problem = self.practice.get(payload.problem_id).await?;
        let submission = Submission {
            answer: payload.answer,
            code: payload.code_submission,
            language: payload.language.map(|l| l.trim().to_lowercase()),
            time_taken: payload.time_taken,
        };
        let grade = self.practice.grade(&problem, &submission).await?;

        let mut tx = self.pool.begin().await?;
        let locked = sqlx::query_as::<_, CategorySession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM category_sessions WHERE id = $1 FOR UPDATE"
        ))
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await?;

        let now = self.clock.now();
        if locked.state() != SessionStatus::InProgress {
            return Err(Error::BadRequest(NOT_IN_PROGRESS.into()));
        }
        if session_rules::is_expired(locked.time_limit, locked.started_at, now) {
            Self::mark_timeout(&mut tx, &locked).await?;
            tx.commit().await?;
            return Err(Error::BadRequest(TIME_EXCEEDED.into()));
        }

        let stored = PracticeService::record_attempt(
            &mut tx,
            NewAttempt {
                problem: &problem,
                user_id,
                session_id: Some(session_id),
                submission: &submission,
                grade: &grade,
            },
            NO_ATTEMPTS_LEFT,
        )
        .await
        .map_err(|e| match e {
            Error::Conflict(_) => Error::BadRequest(ALREADY_ATTEMPTED.into()),
            other => other,
        })?;

        let updated = Self::refresh_progress(&mut tx, &locked, now).await?;
        tx.commit().await?;

        if updated.state() == SessionStatus::Completed {
            tracing::info!(session_id = %updated.id, total_score = updated.total_score, "category session completed");
        }

        Ok(SubmitProblemResponse {
            attempt_id: stored.id,
            problem_id: problem.id,
            passed: stored.passed,
            score: stored.score,
            max_score: stored.max_score,
            points_earned: stored.points_earned,
            attempt_number: stored.attempt_number,
            remaining_attempts: session_rules::remaining_attempts(
                problem.max_attempts,
                i64::from(stored.attempt_number),
            ),
            test_case_results: grade.test_case_results,
            session_progress: progress(&updated, now),
        })
    }

    /// Flips every expired running session to `timeout`. Returns how many changed.
    pub async fn sweep_expired(&self) -> Result<u64> {
        let now = self.clock.now();
        let result = sqlx::query(
            r#"UPDATE category_sessions
               SET status = 'timeout',
                   completed_at = started_at + make_interval(secs => time_limit)
               WHERE status = 'in_progress'
                 AND started_at + make_interval(secs => time_limit) <= $1"#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        let swept = result.rows_affected();
        if swept > 0 {
            tracing::info!(count = swept, "category sessions timed out");
        }
        Ok(swept)
    }

    async fn check_submittable(
        &self,
        session: &CategorySession,
        problem_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if session.state() != SessionStatus::InProgress {
            return Err(Error::BadRequest(NOT_IN_PROGRESS.into()));
        }
        if session_rules::is_expired(session.time_limit, session.started_at, now) {
            let mut tx = self.pool.begin().await?;
            Self::mark_timeout(&mut tx, &session).await?;
            tx.commit().await?;
            return Err(Error::BadRequest(TIME_EXCEEDED.into()));
        }
        let index = session
            .position_of(problem_id)
            .ok_or_else(|| Error::BadRequest(NOT_IN_SESSION.into()))?;

        let in_session: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM practice_attempts WHERE session_id = $1 AND problem_id = $2)",
        )
        .bind(session.id)
        .bind(problem_id)
        .fetch_one(&self.pool)
        .await?;
        if in_session {
            return Err(Error::BadRequest(ALREADY_ATTEMPTED.into()));
        }

        let summaries = self.practice.attempt_summaries(user_id).await?;
        let completed: Vec<bool> = session
            .problem_ids
            .iter()
            .map(|id| summaries.get(id).is_some_and(|s| s.attempt_count > 0))
            .collect();
        if !session_rules::is_available(index, &completed) {
            return Err(Error::BadRequest(PROBLEM_LOCKED.into()));
        }

        let max_attempts: i32 = sqlx::query_scalar("SELECT max_attempts FROM practice_problems WHERE id = $1")
            .bind(problem_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Practice problem not found".into()))?;
        let count = summaries.get(&problem_id).map(|s| s.attempt_count).unwrap_or(0);
        if !session_rules::can_retake(max_attempts, count) {
            return Err(Error::BadRequest(NO_ATTEMPTS_LEFT.into()));
        }
        Ok(())
    }

    /// Drops problems deleted since the session started from a running session, then
    /// recomputes its totals and progress. Availability, completion and the view all read
    /// the pruned list afterwards.
    async fn reconcile(&self, session: CategorySession, now: DateTime<Utc>) -> Result<CategorySession> {
        if session.state() != SessionStatus::InProgress
            || session_rules::is_expired(session.time_limit, session.started_at, now)
        {
            return Ok(session);
        }
        let existing: HashSet<Uuid> =
            sqlx::query_scalar("SELECT id FROM practice_problems WHERE id = ANY($1)")
                .bind(&session.problem_ids)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .collect();
        let kept = surviving_ids(&session.problem_ids, &existing);
        if kept.len() == session.problem_ids.len() {
            return Ok(session);
        }

        let mut tx = self.pool.begin().await?;
        let pruned = sqlx::query_as::<_, CategorySession>(&format!(
            r#"UPDATE category_sessions
               SET problem_ids = $2,
                   total_problems = $3,
                   max_score = (SELECT COALESCE(SUM(points), 0)::int FROM practice_problems WHERE id = ANY($2))
               WHERE id = $1 AND status = 'in_progress'
               RETURNING {SESSION_COLUMNS}"#
        ))
        .bind(session.id)
        .bind(&kept)
        .bind(kept.len() as i32)
        .fetch_optional(&mut *tx)
        .await?;

        let session = match pruned {
            Some(pruned) => {
                tracing::info!(
                    session_id = %pruned.id,
                    removed = session.problem_ids.len() - kept.len(),
                    "deleted problems dropped from category session"
                );
                Self::refresh_progress(&mut tx, &pruned, now).await?
            }
            None => {
                sqlx::query_as::<_, CategorySession>(&format!(
                    "SELECT {SESSION_COLUMNS} FROM category_sessions WHERE id = $1"
                ))
                .bind(session.id)
                .fetch_one(&mut *tx)
                .await?
            }
        };
        tx.commit().await?;
        Ok(session)
    }

    async fn load_owned(&self, user_id: Uuid, session_id: Uuid) -> Result<CategorySession> {
        let session = sqlx::query_as::<_, CategorySession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM category_sessions WHERE id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Session not found".into()))?;
        if session.user_id != user_id {
            return Err(Error::Forbidden("Session belongs to another user".into()));
        }
        Ok(session)
    }

    /// Only touches sessions still running, so the transition happens once.
    async fn mark_timeout(
        tx: &mut Transaction<'_, Postgres>,
        session: &CategorySession,
    ) -> Result<Option<CategorySession>> {
        let updated = sqlx::query_as::<_, CategorySession>(&format!(
            r#"UPDATE category_sessions
               SET status = 'timeout', completed_at = $2
               WHERE id = $1 AND status = 'in_progress'
               RETURNING {SESSION_COLUMNS}"#
        ))
        .bind(session.id)
        .bind(deadline(session))
        .fetch_optional(&mut **tx)
        .await?;
        if updated.is_some() {
            tracing::info!(session_id = %session.id, "category session timed out");
        }
        Ok(updated)
    }

    /// Recomputes progress from stored attempts and completes the session when every problem is done.
    async fn refresh_progress(
        tx: &mut Transaction<'_, Postgres>,
        session: &CategorySession,
        now: DateTime<Utc>,
    ) -> Result<CategorySession> {
        let (completed, total_score): (i64, i64) = sqlx::query_as(
            r#"SELECT COUNT(*)::bigint, COALESCE(SUM(best), 0)::bigint FROM (
                   SELECT problem_id, MAX(score) AS best
                   FROM practice_attempts
                   WHERE user_id = $1 AND problem_id = ANY($2)
                   GROUP BY problem_id
               ) per_problem"#,
        )
        .bind(session.user_id)
        .bind(&session.problem_ids)
        .fetch_one(&mut **tx)
        .await?;

        let completed = completed as i32;
        let finished = session_rules::is_finished(completed, session.total_problems);
        let completed_at = if finished { Some(now) } else { None };

        let updated = sqlx::query_as::<_, CategorySession>(&format!(
            r#"UPDATE category_sessions
               SET problems_completed = $2,
                   total_score = $3,
                   status = CASE WHEN $4 THEN 'completed' ELSE status END,
                   completed_at = COALESCE($5, completed_at)
               WHERE id = $1
               RETURNING {SESSION_COLUMNS}"#
        ))
        .bind(session.id)
        .bind(completed)
        .bind(total_score as i32)
        .bind(finished)
        .bind(completed_at)
        .fetch_one(&mut **tx)
        .await?;
        Ok(updated)
    }

    async fn view(&self, session: CategorySession, category: &Category, now: DateTime<Utc>) -> Result<SessionView> {
        let problems = self.load_problems(&session.problem_ids).await?;
        let summaries = self.practice.attempt_summaries(session.user_id).await?;

        let in_session: HashSet<Uuid> = sqlx::query_scalar(
            "SELECT problem_id FROM practice_attempts WHERE session_id = $1",
        )
        .bind(session.id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .collect();

        let states = problem_states(&problems, &summaries);
        let mut problem_views = Vec::with_capacity(problems.len());
        for (problem, state) in problems.iter().zip(states) {
            let mut value = problem_json(problem, false, summaries.get(&problem.id))?;
            if let JsonValue::Object(map) = &mut value {
                let extra = json!({
                    "completed": state.completed,
                    "passed": state.passed,
                    "available": state.available,
                    "attempt_count": state.attempt_count,
                    "can_retake": session_rules::can_retake(problem.max_attempts, state.attempt_count),
                    "remaining_attempts": session_rules::remaining_attempts(problem.max_attempts, state.attempt_count),
                    "attempted_in_session": in_session.contains(&problem.id),
                    "best_score": state.best_score,
                    "action_label": state.action.label(),
                    "action_enabled": state.action.is_enabled(),
                });
                if let JsonValue::Object(extra) = extra {
                    map.extend(extra);
                }
            }
            problem_views.push(value);
        }

        let session_progress = progress(&session, now);
        Ok(SessionView {
            session_id: session.id,
            category_id: session.category_id,
            title: category.name.clone(),
            description: category.description.clone(),
            problems: problem_views,
            total_problems: session.total_problems,
            max_score: session.max_score,
            time_limit: session.time_limit,
            time_remaining: session_progress.time_remaining,
            started_at: session.started_at,
            status: session_progress.status.clone(),
            session_progress,
        })
    }

    /// Problems in session order. Problems deleted since the session started are skipped.
    async fn load_problems(&self, ids: &[Uuid]) -> Result<Vec<Problem>> {
        let rows = sqlx::query_as::<_, Problem>(&format!(
            "SELECT {PROBLEM_COLUMNS} FROM practice_problems WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        let mut by_id: HashMap<Uuid, Problem> = rows.into_iter().map(|p| (p.id, p)).collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }
}

fn deadline(session: &CategorySession) -> DateTime<Utc> {
    session.started_at + Duration::seconds(i64::from(session.time_limit))
}

/// Session order with problems deleted since the start left out.
fn surviving_ids(ids: &[Uuid], existing: &HashSet<Uuid>) -> Vec<Uuid> {
    ids.iter().copied().filter(|id| existing.contains(id)).collect()
}
