use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CategorySession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub problem_ids: Vec<Uuid>,
    pub total_problems: i32,
    pub max_score: i32,
    /// Seconds.
    pub time_limit: i32,
    pub started_at: DateTime<Utc>,
    pub problems_completed: i32,
    pub total_score: i32,
    pub status: String,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Timeout,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Timeout => "timeout",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "in_progress" => Some(SessionStatus::InProgress),
            "completed" => Some(SessionStatus::Completed),
            "timeout" => Some(SessionStatus::Timeout),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }
}

impl CategorySession {
    pub fn state(&self) -> SessionStatus {
        SessionStatus::parse(&self.status).unwrap_or(SessionStatus::InProgress)
    }

    pub fn position_of(&self, problem_id: Uuid) -> Option<usize> {
        self.problem_ids.iter().position(|id| *id == problem_id)
    }
}
