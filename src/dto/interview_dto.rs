use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::interview::InterviewStatus;

pub const INTERVIEW_TYPES: &[&str] = &["technical", "behavioral", "hr", "final", "video", "phone", "onsite"];

fn validate_interview_type(value: &str) -> std::result::Result<(), validator::ValidationError> {
    crate::utils::validation::validate_one_of(value, INTERVIEW_TYPES, "invalid_interview_type")
}

fn validate_interview_status(value: &str) -> std::result::Result<(), validator::ValidationError> {
    InterviewStatus::parse(value)
        .map(|_| ())
        .ok_or_else(|| validator::ValidationError::new("invalid_status"))
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInterviewPayload {
    pub interviewee_id: Uuid,
    #[validate(length(min = 1, max = 255), custom(function = "crate::utils::validation::validate_not_blank"))]
    pub position: String,
    #[serde(rename = "type", alias = "interview_type", default = "default_type")]
    #[validate(custom(function = "validate_interview_type"))]
    pub interview_type: String,
    pub scheduled_at: DateTime<Utc>,
    #[validate(range(min = 5, max = 480))]
    pub duration: Option<i32>,
    #[validate(length(max = 2000))]
    pub meeting_link: Option<String>,
    #[validate(length(max = 500))]
    pub location: Option<String>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
    pub assessment_id: Option<Uuid>,
}

fn default_type() -> String {
    "technical".to_string()
}

/// Every field optional: absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateInterviewPayload {
    #[validate(length(min = 1, max = 255))]
    pub position: Option<String>,
    #[serde(rename = "type", alias = "interview_type")]
    #[validate(custom(function = "validate_interview_type"))]
    pub interview_type: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[validate(range(min = 5, max = 480))]
    pub duration: Option<i32>,
    #[validate(length(max = 2000))]
    pub meeting_link: Option<String>,
    #[validate(length(max = 500))]
    pub location: Option<String>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
    pub assessment_id: Option<Uuid>,
    #[validate(custom(function = "validate_interview_status"))]
    pub status: Option<String>,
}

/// Flat row joined with both parties; reshaped into [`InterviewView`].
#[derive(Debug, Clone, FromRow)]
pub struct InterviewRow {
    pub id: Uuid,
    pub recruiter_id: Uuid,
    pub interviewee_id: Uuid,
    pub assessment_id: Option<Uuid>,
    pub assessment_title: Option<String>,
    pub position: String,
    pub interview_type: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration: i32,
    pub meeting_link: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub interviewee_name: String,
    pub interviewee_email: String,
    pub interviewee_avatar: Option<String>,
    pub interviewee_position: Option<String>,
    pub recruiter_name: String,
    pub recruiter_email: String,
    pub recruiter_avatar: Option<String>,
    pub recruiter_company: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Party {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterviewView {
    pub id: Uuid,
    pub position: String,
    #[serde(rename = "type")]
    pub interview_type: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration: i32,
    pub meeting_link: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub status: String,
    pub assessment_id: Option<Uuid>,
    pub assessment_title: Option<String>,
    pub interviewee: Party,
    pub recruiter: Party,
    pub created_at: DateTime<Utc>,
}

impl From<InterviewRow> for InterviewView {
    fn from(row: InterviewRow) -> Self {
        Self {
            id: row.id,
            position: row.position,
            interview_type: row.interview_type,
            scheduled_at: row.scheduled_at,
            duration: row.duration,
            meeting_link: row.meeting_link,
            location: row.location,
            notes: row.notes,
            status: row.status,
            assessment_id: row.assessment_id,
            assessment_title: row.assessment_title,
            interviewee: Party {
                id: row.interviewee_id,
                name: row.interviewee_name,
                email: row.interviewee_email,
                avatar: row.interviewee_avatar,
                position: row.interviewee_position,
                company: None,
            },
            recruiter: Party {
                id: row.recruiter_id,
                name: row.recruiter_name,
                email: row.recruiter_email,
                avatar: row.recruiter_avatar,
                position: None,
                company: row.recruiter_company,
            },
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InterviewList {
    pub interviews: Vec<InterviewView>,
}

/// Interviewee picker entry on the scheduling form.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SchedulableCandidate {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub position: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateList {
    pub candidates: Vec<SchedulableCandidate>,
}

/// Splits a stored full name into first and last name.
pub fn split_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or_default().to_string();
    let last = parts.next().unwrap_or_default().trim().to_string();
    (first, last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_accepts_client_body() {
        let payload: CreateInterviewPayload = serde_json::from_value(json!({
            "interviewee_id": Uuid::new_v4(),
            "position": "Backend Engineer",
            "type": "technical",
            "duration": 60,
            "meeting_link": "",
            "location": "",
            "notes": "",
            "scheduled_at": "2026-04-01T09:30:00.000Z"
        }))
        .unwrap();
        assert!(payload.validate().is_ok());
        assert_eq!(payload.assessment_id, None);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let payload = UpdateInterviewPayload {
            status: Some("postponed".into()),
            ..Default::default()
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn names_split_on_first_space() {
        assert_eq!(split_name("Ada King Lovelace"), ("Ada".into(), "King Lovelace".into()));
        assert_eq!(split_name("Plato"), ("Plato".into(), String::new()));
    }
}
