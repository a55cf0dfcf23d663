use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::error::{Error, Result};
use crate::models::assessment::{Assessment, AssessmentAttempt};
use crate::models::question::{number_questions, Question};

pub const ASSESSMENT_STATUSES: &[&str] = &["draft", "active"];

fn validate_assessment_status(value: &str) -> std::result::Result<(), validator::ValidationError> {
    crate::utils::validation::validate_one_of(value, ASSESSMENT_STATUSES, "invalid_status")
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AssessmentPayload {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type", alias = "assessment_type")]
    pub assessment_type: Option<String>,
    pub difficulty: Option<String>,
    #[validate(range(min = 1, max = 600))]
    pub duration: Option<i32>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub passing_score: Option<f64>,
    pub instructions: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[validate(custom(function = "validate_assessment_status"))]
    pub status: Option<String>,
    /// RFC 3339, `YYYY-MM-DDTHH:MM`, `YYYY-MM-DD` or empty.
    pub deadline: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
    pub category_id: Option<Uuid>,
}

impl AssessmentPayload {
    pub fn status_or_default(&self) -> String {
        self.status
            .as_deref()
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_else(|| "draft".to_string())
    }

    pub fn passing_score_decimal(&self) -> Decimal {
        self.passing_score
            .and_then(Decimal::from_f64)
            .map(|d| d.round_dp(2))
            .unwrap_or_else(|| Decimal::from(70))
    }

    pub fn deadline_at(&self) -> Result<Option<DateTime<Utc>>> {
        parse_deadline(self.deadline.as_deref())
    }

    /// Numbered and checked questions. Publishing needs at least one.
    pub fn checked_questions(&self) -> Result<Vec<Question>> {
        let mut questions = self.questions.clone();
        number_questions(&mut questions);
        for q in &questions {
            q.check().map_err(Error::BadRequest)?;
        }
        if self.status_or_default() == "active" && questions.is_empty() {
            return Err(Error::BadRequest(
                "An assessment needs at least one question before it can be published".into(),
            ));
        }
        Ok(questions)
    }
}

pub fn parse_deadline(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M") {
        return Ok(Some(ts.and_utc()));
    }
    if let Some(end_of_day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(23, 59, 59))
    {
        return Ok(Some(end_of_day.and_utc()));
    }
    Err(Error::BadRequest(format!("Invalid deadline '{}'", raw)))
}

pub fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentResponse {
    pub id: Uuid,
    pub assessment_id: Uuid,
    pub recruiter_id: Uuid,
    pub category_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub assessment_type: String,
    pub difficulty: Option<String>,
    pub duration: i32,
    pub passing_score: f64,
    pub instructions: Option<String>,
    pub tags: Vec<String>,
    pub status: String,
    pub deadline: Option<DateTime<Utc>>,
    pub questions: JsonValue,
    pub question_count: usize,
    pub candidates: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssessmentResponse {
    pub fn new(assessment: Assessment, candidates: i64) -> Self {
        let question_count = assessment.questions.as_array().map(Vec::len).unwrap_or(0);
        Self {
            id: assessment.id,
            assessment_id: assessment.id,
            recruiter_id: assessment.recruiter_id,
            category_id: assessment.category_id,
            title: assessment.title,
            description: assessment.description,
            assessment_type: assessment.assessment_type,
            difficulty: assessment.difficulty,
            duration: assessment.duration,
            passing_score: decimal_to_f64(assessment.passing_score),
            instructions: assessment.instructions,
            tags: assessment.tags,
            status: assessment.status,
            deadline: assessment.deadline,
            questions: assessment.questions,
            question_count,
            candidates,
            created_at: assessment.created_at,
            updated_at: assessment.updated_at,
        }
    }
}

/// One candidate row on the results page.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ResultRow {
    pub attempt_id: Uuid,
    pub candidate_id: Uuid,
    pub candidate_name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub time_spent: i64,
    pub review_id: Option<Uuid>,
    pub review_status: Option<String>,
    #[serde(serialize_with = "serialize_opt_decimal")]
    pub score: Option<Decimal>,
    pub passed: Option<bool>,
    pub results_released: Option<bool>,
}

fn serialize_opt_decimal<S>(value: &Option<Decimal>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(v) => serializer.serialize_some(&decimal_to_f64(*v)),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// Trimmed, lowercased, deduplicated addresses.
    pub fn addresses(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            OneOrMany::One(s) => s.split([',', ';', '\n']).collect(),
            OneOrMany::Many(v) => v.iter().map(String::as_str).collect(),
        };
        let mut out: Vec<String> = Vec::new();
        for addr in raw {
            let addr = addr.trim().to_lowercase();
            if !addr.is_empty() && !out.contains(&addr) {
                out.push(addr);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendInvitePayload {
    pub email: OneOrMany,
    pub assessment_id: Uuid,
    #[validate(length(max = 5000))]
    pub message: Option<String>,
    #[validate(length(max = 255))]
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InviteReport {
    pub invited: Vec<String>,
    pub already_invited: Vec<String>,
    pub unknown_emails: Vec<String>,
    pub invalid_emails: Vec<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InvitationView {
    pub id: Uuid,
    pub assessment_id: Uuid,
    pub assessment_title: String,
    pub assessment_duration: i32,
    pub interviewee_id: Uuid,
    pub interviewee_name: String,
    pub interviewee_email: String,
    pub company_name: Option<String>,
    pub status: String,
    pub message: Option<String>,
    pub invited_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvitationQuery {
    pub invitation: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SaveAnswerPayload {
    #[validate(range(min = 1))]
    pub question_id: i32,
    #[serde(default)]
    pub answer: JsonValue,
    #[validate(range(min = 0))]
    pub next_question: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptView {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub assessment_id: Uuid,
    pub answers: JsonValue,
    pub current_question: i32,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    /// Seconds.
    pub time_remaining: i64,
}

impl AttemptView {
    pub fn new(attempt: AssessmentAttempt, time_remaining: i64) -> Self {
        Self {
            id: attempt.id,
            attempt_id: attempt.id,
            assessment_id: attempt.assessment_id,
            answers: attempt.answers,
            current_question: attempt.current_question,
            status: attempt.status,
            started_at: attempt.started_at,
            submitted_at: attempt.submitted_at,
            time_remaining,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitAssessmentResponse {
    pub attempt_id: Uuid,
    pub review_id: Uuid,
    pub status: String,
    pub auto_score: f64,
    pub needs_review: bool,
}

/// One row of a candidate's results page.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AttemptSummaryRow {
    pub attempt_id: Uuid,
    pub assessment_id: Uuid,
    pub assessment_title: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub time_spent: i64,
    pub has_review: bool,
    pub review_status: Option<String>,
    pub results_released: bool,
    #[serde(serialize_with = "serialize_opt_decimal")]
    pub score: Option<Decimal>,
    #[serde(serialize_with = "serialize_opt_decimal")]
    pub final_score: Option<Decimal>,
    pub passed: Option<bool>,
}

impl AttemptSummaryRow {
    /// Scores stay hidden until the recruiter releases them.
    pub fn redact_unreleased(mut self) -> Self {
        if !self.results_released {
            self.score = None;
            self.final_score = None;
            self.passed = None;
        }
        self
    }
}
