use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use crate::dto::practice_dto::{
    AttemptResponse, AttemptResultResponse, ProblemListQuery, ProblemPayload, StatisticsResponse,
    SubmitAttemptPayload,
};
use crate::error::{Error, Result};
use crate::models::practice_attempt::{AttemptSummary, PracticeAttempt};
use crate::models::problem::{Difficulty, Problem, ProblemDetails, ProblemType};
use crate::services::audit_service::AuditService;
use crate::services::code_runner::CodeRunner;
use crate::services::draft_service::DraftService;
use crate::services::grading_service::{GradingService, PracticeGrade};
use crate::services::session_rules;

pub(crate) const PROBLEM_COLUMNS: &str = r#"
    id, title, description, difficulty, problem_type, points, max_attempts, category_id,
    tags, is_public, estimated_time, hints, learning_resources, study_sections, details,
    created_by, created_at, updated_at
"#;

const ATTEMPT_COLUMNS: &str = r#"
    id, problem_id, user_id, session_id, answer, language, score, max_score, passed,
    points_earned, time_taken, attempt_number, test_case_results, created_at
"#;

/// A candidate's answer in the shape every problem type can read.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub answer: JsonValue,
    pub code: Option<String>,
    pub language: Option<String>,
    pub time_taken: Option<i32>,
}

impl Submission {
    pub fn from_payload(payload: SubmitAttemptPayload, now: DateTime<Utc>) -> Self {
        let time_taken = payload.time_taken.or_else(|| {
            payload.start_time.map(|start| {
                let elapsed = now.timestamp() as f64 - start;
                elapsed.max(0.0).round() as i32
            })
        });
        Self {
            answer: payload.answer.unwrap_or(JsonValue::Null),
            code: payload.code_submission,
            language: payload.language.map(|l| l.trim().to_lowercase()),
            time_taken,
        }
    }

    fn stored_answer(&self) -> JsonValue {
        match &self.code {
            Some(code) => serde_json::json!({ "code": code }),
            None => self.answer.clone(),
        }
    }
}

pub struct NewAttempt<'a> {
    pub problem: &'a Problem,
    pub user_id: Uuid,
    pub session_id: Option<Uuid>,
    pub submission: &'a Submission,
    pub grade: &'a PracticeGrade,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProblemAttemptRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub score: i32,
    pub max_score: i32,
    pub passed: bool,
    pub attempt_number: i32,
    pub time_taken: Option<i32>,
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct PracticeService {
    pool: PgPool,
    runner: CodeRunner,
    audit: AuditService,
}

impl PracticeService {
    pub fn new(pool: PgPool, runner: CodeRunner, audit: AuditService) -> Self {
        Self { pool, runner, audit }
    }

    pub async fn create(&self, payload: ProblemPayload, created_by: Uuid) -> Result<Problem> {
        let details = payload.details()?;
        if let Some(category_id) = payload.category_id {
            self.ensure_category(category_id).await?;
        }
        let problem = sqlx::query_as::<_, Problem>(&format!(
            r#"INSERT INTO practice_problems (
                   title, description, difficulty, problem_type, points, max_attempts, category_id,
                   tags, is_public, estimated_time, hints, learning_resources, study_sections,
                   details, created_by
               ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)
               RETURNING {PROBLEM_COLUMNS}"#
        ))
        .bind(payload.title.trim())
        .bind(&payload.description)
        .bind(difficulty_label(&payload.difficulty)?)
        .bind(details.problem_type().as_str())
        .bind(payload.points.unwrap_or(10))
        .bind(payload.max_attempts_or_default())
        .bind(payload.category_id)
        .bind(&payload.tags)
        .bind(payload.is_public.unwrap_or(true))
        .bind(payload.estimated_time)
        .bind(serde_json::to_value(&payload.hints)?)
        .bind(serde_json::to_value(&payload.learning_resources)?)
        .bind(serde_json::to_value(&payload.study_sections)?)
        .bind(serde_json::to_value(&details)?)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(problem_id = %problem.id, problem_type = %problem.problem_type, "practice problem created");
        Ok(problem)
    }

    /// Full replacement, as the editor always sends the whole problem.
    pub async fn update(&self, id: Uuid, payload: ProblemPayload) -> Result<Problem> {
        let details = payload.details()?;
        if let Some(category_id) = payload.category_id {
            self.ensure_category(category_id).await?;
        }
        let problem = sqlx::query_as::<_, Problem>(&format!(
            r#"UPDATE practice_problems SET
                   title = $2, description = $3, difficulty = $4, problem_type = $5, points = $6,
                   max_attempts = $7, category_id = $8, tags = $9, is_public = $10,
                   estimated_time = $11, hints = $12, learning_resources = $13,
                   study_sections = $14, details = $15, updated_at = NOW()
               WHERE id = $1
               RETURNING {PROBLEM_COLUMNS}"#
        ))
        .bind(id)
        .bind(payload.title.trim())
        .bind(&payload.description)
        .bind(difficulty_label(&payload.difficulty)?)
        .bind(details.problem_type().as_str())
        .bind(payload.points.unwrap_or(10))
        .bind(payload.max_attempts_or_default())
        .bind(payload.category_id)
        .bind(&payload.tags)
        .bind(payload.is_public.unwrap_or(true))
        .bind(payload.estimated_time)
        .bind(serde_json::to_value(&payload.hints)?)
        .bind(serde_json::to_value(&payload.learning_resources)?)
        .bind(serde_json::to_value(&payload.study_sections)?)
        .bind(serde_json::to_value(&details)?)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Practice problem not found".into()))?;
        Ok(problem)
    }

    pub async fn delete(&self, id: Uuid, deleted_by: Uuid) -> Result<()> {
        let title: Option<String> =
            sqlx::query_scalar("DELETE FROM practice_problems WHERE id = $1 RETURNING title")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        let title = title.ok_or_else(|| Error::NotFound("Practice problem not found".into()))?;
        tracing::info!(problem_id = %id, "practice problem deleted");
        self.audit
            .record(
                deleted_by,
                "practice_problem_deleted",
                "practice_problem",
                id,
                Some(serde_json::json!({ "title": title })),
            )
            .await;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Problem> {
        sqlx::query_as::<_, Problem>(&format!(
            "SELECT {PROBLEM_COLUMNS} FROM practice_problems WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Practice problem not found".into()))
    }

    pub async fn list(&self, query: ProblemListQuery, public_only: bool) -> Result<Vec<Problem>> {
        let mut filters: Vec<String> = Vec::new();
        let mut args: Vec<String> = Vec::new();

        if public_only {
            filters.push("is_public = TRUE".to_string());
        }
        if let Some(category_id) = query.category_id {
            args.push(category_id.to_string());
            filters.push(format!("category_id = ${}::uuid", args.len()));
        }
        if let Some(difficulty) = query.difficulty.as_deref().and_then(Difficulty::parse) {
            args.push(difficulty.as_str().to_string());
            filters.push(format!("difficulty = ${}", args.len()));
        }
        if let Some(problem_type) = query.problem_type.as_deref().and_then(ProblemType::parse) {
            args.push(problem_type.as_str().to_string());
            filters.push(format!("problem_type = ${}", args.len()));
        }
        if let Some(search) = query.search.filter(|s| !s.trim().is_empty()) {
            args.push(format!("%{}%", search.trim()));
            filters.push(format!(
                "(title ILIKE ${0} OR description ILIKE ${0} OR array_to_string(tags, ' ') ILIKE ${0})",
                args.len()
            ));
        }

        let where_clause = if filters.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", filters.join(" AND "))
        };
        let sql = format!(
            r#"SELECT {PROBLEM_COLUMNS} FROM practice_problems {where_clause}
               ORDER BY CASE difficulty WHEN 'Easy' THEN 0 WHEN 'Medium' THEN 1 ELSE 2 END, created_at"#
        );

        let mut q = sqlx::query_as::<_, Problem>(&sql);
        for arg in &args {
            q = q.bind(arg);
        }
        Ok(q.fetch_all(&self.pool).await?)
    }

    /// Attempt aggregates for a user, keyed by problem.
    pub async fn attempt_summaries(&self, user_id: Uuid) -> Result<HashMap<Uuid, AttemptSummary>> {
        let rows = sqlx::query_as::<_, AttemptSummary>(
            r#"SELECT problem_id,
                      COUNT(*) AS attempt_count,
                      COALESCE(MAX(score), 0) AS best_score,
                      COALESCE(MAX(max_score), 0) AS best_max_score,
                      BOOL_OR(passed) AS ever_passed
               FROM practice_attempts
               WHERE user_id = $1
               GROUP BY problem_id"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| (r.problem_id, r)).collect())
    }

    /// Grades a submission. Runs code through the sandbox for coding problems.
    pub async fn grade(&self, problem: &Problem, submission: &Submission) -> Result<PracticeGrade> {
        match problem.parsed_details()? {
            ProblemDetails::Coding(coding) => {
                let code = submission
                    .code
                    .as_deref()
                    .or_else(|| submission.answer.as_str())
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| Error::BadRequest("code_submission is required".into()))?;
                let language = submission
                    .language
                    .as_deref()
                    .filter(|l| !l.is_empty())
                    .ok_or_else(|| Error::BadRequest("language is required".into()))?;
                if !coding.allowed_languages.is_empty()
                    && !coding.allowed_languages.iter().any(|l| l == language)
                {
                    return Err(Error::BadRequest(format!(
                        "Language '{}' is not allowed for this problem",
                        language
                    )));
                }
                let cases = coding.all_test_cases();
                let mut outcomes = self.runner.evaluate(code, language, &cases).await?;
                for hidden in outcomes.iter_mut().skip(coding.visible_test_cases.len()) {
                    hidden.output = None;
                    hidden.runtime_error = None;
                }
                Ok(GradingService::grade_coding(problem.points, outcomes))
            }
            ProblemDetails::MultipleChoice(mc) => {
                if submission.answer.is_null() {
                    return Err(Error::BadRequest("answer is required".into()));
                }
                Ok(GradingService::grade_multiple_choice(&mc, problem.points, &submission.answer))
            }
            ProblemDetails::ShortAnswer(sa) => {
                let text = submission
                    .answer
                    .as_str()
                    .ok_or_else(|| Error::BadRequest("answer must be text".into()))?;
                GradingService::grade_short_answer(&sa, problem.points, text)
            }
        }
    }

    pub async fn attempt_count(&self, user_id: Uuid, problem_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM practice_attempts WHERE user_id = $1 AND problem_id = $2",
        )
        .bind(user_id)
        .bind(problem_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Stores a graded attempt inside `tx`. Serialises numbering per (user, problem).
    pub async fn record_attempt(
        tx: &mut Transaction<'_, Postgres>,
        attempt: NewAttempt<'_>,
        limit_message: &str,
    ) -> Result<PracticeAttempt> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text), hashtext($2::text))")
            .bind(attempt.user_id)
            .bind(attempt.problem.id)
            .execute(&mut **tx)
            .await?;

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM practice_attempts WHERE user_id = $1 AND problem_id = $2",
        )
        .bind(attempt.user_id)
        .bind(attempt.problem.id)
        .fetch_one(&mut **tx)
        .await?;
        if !session_rules::can_retake(attempt.problem.max_attempts, count) {
            return Err(Error::BadRequest(limit_message.to_string()));
        }

        let test_case_results = match &attempt.grade.test_case_results {
            Some(results) => Some(serde_json::to_value(results)?),
            None => None,
        };
        let points_earned = if attempt.grade.passed { attempt.problem.points } else { 0 };

        let stored = sqlx::query_as::<_, PracticeAttempt>(&format!(
            r#"INSERT INTO practice_attempts (
                   problem_id, user_id, session_id, answer, language, score, max_score, passed,
                   points_earned, time_taken, attempt_number, test_case_results
               ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
               RETURNING {ATTEMPT_COLUMNS}"#
        ))
        .bind(attempt.problem.id)
        .bind(attempt.user_id)
        .bind(attempt.session_id)
        .bind(attempt.submission.stored_answer())
        .bind(&attempt.submission.language)
        .bind(attempt.grade.score)
        .bind(attempt.grade.max_score)
        .bind(attempt.grade.passed)
        .bind(points_earned)
        .bind(attempt.submission.time_taken)
        .bind((count + 1) as i32)
        .bind(test_case_results)
        .fetch_one(&mut **tx)
        .await?;

        DraftService::clear_after_submit(&mut **tx, attempt.user_id, attempt.problem.id).await?;
        Ok(stored)
    }

    /// Arena submission outside of any category session.
    pub async fn submit_attempt(
        &self,
        user_id: Uuid,
        problem_id: Uuid,
        submission: Submission,
    ) -> Result<AttemptResultResponse> {
        let problem = self.get(problem_id).await?;
        let prior = self.attempt_count(user_id, problem_id).await?;
        if !session_rules::can_retake(problem.max_attempts, prior) {
            return Err(Error::BadRequest("Maximum attempts reached".into()));
        }

        let grade = self.grade(&problem, &submission).await?;

        let mut tx = self.pool.begin().await?;
        let stored = Self::record_attempt(
            &mut tx,
            NewAttempt {
                problem: &problem,
                user_id,
                session_id: None,
                submission: &submission,
                grade: &grade,
            },
            "Maximum attempts reached",
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            attempt_id = %stored.id,
            problem_id = %problem.id,
            passed = stored.passed,
            "practice attempt recorded"
        );

        Ok(AttemptResultResponse {
            attempt_id: stored.id,
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
        })
    }

    pub async fn list_user_attempts(&self, user_id: Uuid) -> Result<Vec<AttemptResponse>> {
        #[derive(FromRow)]
        struct Row {
            #[sqlx(flatten)]
            attempt: PracticeAttempt,
            problem_title: String,
        }

        let rows = sqlx::query_as::<_, Row>(
            r#"SELECT a.id, a.problem_id, a.user_id, a.session_id, a.answer, a.language, a.score,
                      a.max_score, a.passed, a.points_earned, a.time_taken, a.attempt_number,
                      a.test_case_results, a.created_at, p.title AS problem_title
               FROM practice_attempts a
               JOIN practice_problems p ON p.id = a.problem_id
               WHERE a.user_id = $1
               ORDER BY a.created_at DESC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| AttemptResponse::new(r.attempt, Some(r.problem_title)))
            .collect())
    }

    pub async fn list_problem_attempts(&self, problem_id: Uuid) -> Result<Vec<ProblemAttemptRow>> {
        self.get(problem_id).await?;
        let rows = sqlx::query_as::<_, ProblemAttemptRow>(
            r#"SELECT a.id, a.user_id, u.full_name AS user_name, u.email AS user_email, a.score,
                      a.max_score, a.passed, a.attempt_number, a.time_taken, a.language, a.created_at
               FROM practice_attempts a
               JOIN users u ON u.id = a.user_id
               WHERE a.problem_id = $1
               ORDER BY a.created_at DESC"#,
        )
        .bind(problem_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn statistics(&self, user_id: Uuid, today: NaiveDate) -> Result<StatisticsResponse> {
        #[derive(FromRow)]
        struct Totals {
            total_attempts: i64,
            passed_attempts: i64,
            problems_solved: i64,
            avg_time: Option<f64>,
        }

        let totals = sqlx::query_as::<_, Totals>(
            r#"SELECT COUNT(*) AS total_attempts,
                      COUNT(*) FILTER (WHERE passed) AS passed_attempts,
                      COUNT(DISTINCT problem_id) FILTER (WHERE passed) AS problems_solved,
                      AVG(time_taken)::float8 AS avg_time
               FROM practice_attempts
               WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let total_points: i64 = sqlx::query_scalar(
            r#"SELECT COALESCE(SUM(best), 0)::bigint FROM (
                   SELECT MAX(points_earned) AS best
                   FROM practice_attempts
                   WHERE user_id = $1
                   GROUP BY problem_id
               ) per_problem"#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let days: Vec<NaiveDate> = sqlx::query_scalar(
            r#"SELECT DISTINCT (created_at AT TIME ZONE 'UTC')::date AS day
               FROM practice_attempts
               WHERE user_id = $1
               ORDER BY day DESC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(StatisticsResponse {
            problems_solved: totals.problems_solved,
            success_rate: success_rate(totals.passed_attempts, totals.total_attempts),
            avg_time: totals.avg_time.map(|t| (t * 10.0).round() / 10.0).unwrap_or(0.0),
            streak: streak_days(&days, today),
            total_attempts: totals.total_attempts,
            total_points,
        })
    }

    async fn ensure_category(&self, category_id: Uuid) -> Result<()> {
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

fn difficulty_label(raw: &str) -> Result<&'static str> {
    Difficulty::parse(raw)
        .map(|d| d.as_str())
        .ok_or_else(|| Error::BadRequest(format!("Unknown difficulty '{}'", raw)))
}

/// Percentage of passing attempts, one decimal place.
pub fn success_rate(passed: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((passed as f64) * 1000.0 / (total as f64)).round() / 10.0
}

/// Consecutive days with activity ending today, or yesterday if nothing happened today yet.
pub fn streak_days(days_desc: &[NaiveDate], today: NaiveDate) -> i64 {
    let mut expected = match days_desc.first() {
        Some(d) if *d == today => today,
        Some(d) if *d == today - Duration::days(1) => *d,
        _ => return 0,
    };
    let mut streak = 0;
    for day in days_desc {
        if *day == expected {
            streak += 1;
            expected -= Duration::days(1);
        } else if *day < expected {
            break;
        }
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn streak_counts_consecutive_days() {
        assert_eq!(streak_days(&[day(10), day(9), day(8), day(6)], day(10)), 3);
    }

    #[test]
    fn streak_survives_until_end_of_next_day() {
        assert_eq!(streak_days(&[day(9), day(8)], day(10)), 2);
    }

    #[test]
    fn streak_resets_after_gap() {
        assert_eq!(streak_days(&[day(7), day(6)], day(10)), 0);
        assert_eq!(streak_days(&[], day(10)), 0);
    }

    #[test]
    fn success_rate_rounds_to_one_decimal() {
        assert_eq!(success_rate(1, 3), 33.3);
        assert_eq!(success_rate(0, 0), 0.0);
        assert_eq!(success_rate(4, 4), 100.0);
    }

    #[test]
    fn submission_derives_time_taken_from_start() {
        let now = Utc::now();
        let payload = SubmitAttemptPayload {
            answer: None,
            code_submission: Some("print(1)".into()),
            language: Some(" Python ".into()),
            start_time: Some(now.timestamp() as f64 - 42.0),
            time_taken: None,
        };
        let submission = Submission::from_payload(payload, now);
        assert_eq!(submission.time_taken, Some(42));
        assert_eq!(submission.language.as_deref(), Some("python"));
        assert_eq!(submission.stored_answer()["code"], "print(1)");
    }
}
