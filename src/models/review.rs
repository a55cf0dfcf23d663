use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub graded_answers: JsonValue,
    pub auto_score: Decimal,
    pub final_score: Option<Decimal>,
    pub passed: Option<bool>,
    pub overall_feedback: Option<String>,
    pub review_status: String,
    pub results_released: bool,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One answer inside a review, as graded automatically and adjusted by the reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedAnswer {
    pub question_id: i32,
    pub question_text: String,
    #[serde(rename = "type")]
    pub question_type: String,
    pub candidate_answer: JsonValue,
    pub correct_answer: JsonValue,
    pub max_points: i32,
    pub auto_score: i32,
    pub auto_is_correct: Option<bool>,
    pub manual_score: Option<i32>,
    pub manual_is_correct: Option<bool>,
    pub review_notes: Option<String>,
    pub needs_review: bool,
}

impl GradedAnswer {
    /// Reviewer's score wins over the automatic one.
    pub fn effective_score(&self) -> i32 {
        self.manual_score.unwrap_or(self.auto_score)
    }
}
