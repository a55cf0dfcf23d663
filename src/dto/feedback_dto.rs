use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::feedback::{FEEDBACK_PRIORITIES, FEEDBACK_STATUSES, FEEDBACK_TYPES};
use crate::utils::validation::validate_one_of;

fn validate_feedback_type(value: &str) -> std::result::Result<(), validator::ValidationError> {
    validate_one_of(value, FEEDBACK_TYPES, "invalid_feedback_type")
}

fn validate_feedback_status(value: &str) -> std::result::Result<(), validator::ValidationError> {
    validate_one_of(value, FEEDBACK_STATUSES, "invalid_status")
}

fn validate_feedback_priority(value: &str) -> std::result::Result<(), validator::ValidationError> {
    validate_one_of(value, FEEDBACK_PRIORITIES, "invalid_priority")
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateFeedbackPayload {
    #[serde(rename = "type", alias = "feedback_type", default = "default_type")]
    #[validate(custom(function = "validate_feedback_type"))]
    pub feedback_type: String,
    #[validate(length(min = 1, max = 200), custom(function = "crate::utils::validation::validate_not_blank"))]
    pub subject: String,
    #[validate(length(min = 1, max = 5000), custom(function = "crate::utils::validation::validate_not_blank"))]
    pub message: String,
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i32>,
}

fn default_type() -> String {
    "general".to_string()
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateFeedbackPayload {
    #[validate(custom(function = "validate_feedback_status"))]
    pub status: Option<String>,
    #[validate(custom(function = "validate_feedback_priority"))]
    pub priority: Option<String>,
    #[validate(length(max = 5000))]
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FeedbackView {
    pub id: Uuid,
    pub interviewee_id: Uuid,
    pub interviewee_name: String,
    pub interviewee_email: String,
    #[serde(rename = "type")]
    pub feedback_type: String,
    pub subject: String,
    pub message: String,
    pub rating: Option<i32>,
    pub status: String,
    pub priority: String,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackList {
    pub feedback: Vec<FeedbackView>,
}

#[derive(Debug, Clone, Default, Serialize, FromRow)]
pub struct FeedbackStats {
    pub total_feedback: i64,
    pub pending_feedback: i64,
    pub reviewed_feedback: i64,
    pub resolved_feedback: i64,
    /// Submitted in the last seven days.
    pub recent_feedback: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_body_parses_and_validates() {
        let payload: CreateFeedbackPayload = serde_json::from_value(json!({
            "type": "bug_report",
            "subject": "Timer froze",
            "message": "The countdown stopped at 00:12"
        }))
        .unwrap();
        assert!(payload.validate().is_ok());
        assert_eq!(payload.rating, None);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let payload: CreateFeedbackPayload = serde_json::from_value(json!({
            "type": "rant", "subject": "x", "message": "y"
        }))
        .unwrap();
        assert!(payload.validate().is_err());
    }

    #[test]
    fn priority_must_be_known() {
        let payload = UpdateFeedbackPayload {
            priority: Some("urgent".into()),
            ..Default::default()
        };
        assert!(payload.validate().is_err());
    }
}
