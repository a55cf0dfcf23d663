use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

use crate::models::question::{Question, QuestionDetails};
use crate::models::review::GradedAnswer;

/// A graded answer merged with its question, in the shape the review screen reads.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewQuestion {
    pub question_id: i32,
    pub question: String,
    #[serde(rename = "type")]
    pub question_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starter_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub points: i32,
    pub answer: JsonValue,
    pub correct_answer: JsonValue,
    pub auto_score: i32,
    pub auto_is_correct: Option<bool>,
    pub manual_score: Option<i32>,
    pub manual_is_correct: Option<bool>,
    pub review_notes: Option<String>,
    pub needs_review: bool,
}

impl ReviewQuestion {
    pub fn new(answer: &GradedAnswer, question: Option<&Question>) -> Self {
        let (options, starter_code) = match question.map(|q| &q.details) {
            Some(QuestionDetails::MultipleChoice(mc)) => (Some(mc.options.clone()), None),
            Some(QuestionDetails::Coding(c)) => (None, c.starter_code.clone()),
            _ => (None, None),
        };
        Self {
            question_id: answer.question_id,
            question: answer.question_text.clone(),
            question_type: answer.question_type.clone(),
            options,
            starter_code,
            explanation: question.and_then(|q| q.explanation.clone()),
            points: answer.max_points,
            answer: answer.candidate_answer.clone(),
            correct_answer: answer.correct_answer.clone(),
            auto_score: answer.auto_score,
            auto_is_correct: answer.auto_is_correct,
            manual_score: answer.manual_score,
            manual_is_correct: answer.manual_is_correct,
            review_notes: answer.review_notes.clone(),
            needs_review: answer.needs_review,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    pub review_id: Uuid,
    pub attempt_id: Uuid,
    pub assessment_id: Uuid,
    pub assessment_title: String,
    pub candidate_id: Uuid,
    pub candidate_name: String,
    pub candidate_email: String,
    /// Seconds.
    pub time_spent: i64,
    pub completed_at: Option<DateTime<Utc>>,
    pub auto_score: f64,
    pub final_score: Option<f64>,
    pub passed: Option<bool>,
    pub passing_score: f64,
    pub review_status: String,
    pub results_released: bool,
    pub overall_feedback: Option<String>,
    pub questions: Vec<ReviewQuestion>,
}

/// Partial update of one answer. `is_correct` alone awards full or zero points.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateAnswerPayload {
    #[validate(range(min = 0.0))]
    pub manual_score: Option<f64>,
    #[serde(alias = "manual_is_correct")]
    pub is_correct: Option<bool>,
    #[validate(length(max = 5000))]
    pub review_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CompleteReviewPayload {
    #[validate(length(max = 10000))]
    pub overall_feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompleteReviewResponse {
    pub review_id: Uuid,
    pub final_score: f64,
    pub passed: bool,
    pub review_status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseResponse {
    pub review_id: Uuid,
    pub results_released: bool,
}
