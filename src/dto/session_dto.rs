use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

use crate::services::grading_service::TestCaseOutcome;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitProblemPayload {
    pub problem_id: Uuid,
    #[serde(default)]
    pub answer: JsonValue,
    pub code_submission: Option<String>,
    pub language: Option<String>,
    #[validate(range(min = 0))]
    pub time_taken: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionProgress {
    pub problems_completed: i32,
    pub total_problems: i32,
    pub total_score: i32,
    pub max_score: i32,
    pub time_spent: i64,
    pub time_remaining: i64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub problems: Vec<JsonValue>,
    pub total_problems: i32,
    pub max_score: i32,
    /// Seconds.
    pub time_limit: i32,
    pub time_remaining: i64,
    pub started_at: DateTime<Utc>,
    pub status: String,
    pub session_progress: SessionProgress,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitProblemResponse {
    pub attempt_id: Uuid,
    pub problem_id: Uuid,
    pub passed: bool,
    pub score: i32,
    pub max_score: i32,
    pub points_earned: i32,
    pub attempt_number: i32,
    pub remaining_attempts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_case_results: Option<Vec<TestCaseOutcome>>,
    pub session_progress: SessionProgress,
}

#[derive(Debug, Clone, Serialize)]
pub struct PracticeCategoryResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub total_problems: i64,
    pub total_points: i64,
    pub session_status: Option<String>,
    pub session_id: Option<Uuid>,
    pub problems_completed: Option<i32>,
}
