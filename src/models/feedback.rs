use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Feedback {
    pub id: Uuid,
    pub interviewee_id: Uuid,
    pub subject: String,
    pub message: String,
    pub feedback_type: String,
    pub rating: Option<i32>,
    pub status: String,
    pub priority: String,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const FEEDBACK_TYPES: &[&str] = &["general", "suggestion", "bug_report", "assessment", "interview"];
pub const FEEDBACK_STATUSES: &[&str] = &["pending", "reviewed", "resolved"];
pub const FEEDBACK_PRIORITIES: &[&str] = &["low", "medium", "high"];
