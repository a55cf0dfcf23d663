use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Draft {
    pub user_id: Uuid,
    pub problem_id: Uuid,
    pub kind: String,
    pub payload: JsonValue,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftKind {
    #[serde(alias = "code")]
    Coding,
    #[serde(alias = "short-answer", alias = "sa")]
    ShortAnswer,
}

impl DraftKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftKind::Coding => "coding",
            DraftKind::ShortAnswer => "short_answer",
        }
    }
}

impl Default for DraftKind {
    fn default() -> Self {
        DraftKind::Coding
    }
}
