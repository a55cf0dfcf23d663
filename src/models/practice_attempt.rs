use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PracticeAttempt {
    pub id: Uuid,
    pub problem_id: Uuid,
    pub user_id: Uuid,
    pub session_id: Option<Uuid>,
    pub answer: JsonValue,
    pub language: Option<String>,
    pub score: i32,
    pub max_score: i32,
    pub passed: bool,
    pub points_earned: i32,
    pub time_taken: Option<i32>,
    pub attempt_number: i32,
    pub test_case_results: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

/// Per-problem aggregate of a user's attempts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct AttemptSummary {
    pub problem_id: Uuid,
    pub attempt_count: i64,
    pub best_score: i32,
    pub best_max_score: i32,
    pub ever_passed: bool,
}
