use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Interview {
    pub id: Uuid,
    pub recruiter_id: Uuid,
    pub interviewee_id: Uuid,
    pub assessment_id: Option<Uuid>,
    pub position: String,
    pub interview_type: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration: i32,
    pub meeting_link: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
}

impl InterviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewStatus::Scheduled => "scheduled",
            InterviewStatus::Confirmed => "confirmed",
            InterviewStatus::Completed => "completed",
            InterviewStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "scheduled" => Some(InterviewStatus::Scheduled),
            "confirmed" => Some(InterviewStatus::Confirmed),
            "completed" => Some(InterviewStatus::Completed),
            "cancelled" | "canceled" => Some(InterviewStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InterviewStatus::Completed | InterviewStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: InterviewStatus) -> bool {
        use InterviewStatus::*;
        if *self == next {
            return !self.is_terminal();
        }
        match (self, next) {
            (Scheduled, Confirmed) | (Scheduled, Completed) | (Confirmed, Completed) => true,
            (Scheduled, Cancelled) | (Confirmed, Cancelled) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::InterviewStatus::*;

    #[test]
    fn forward_transitions_are_allowed() {
        assert!(Scheduled.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Scheduled.can_transition_to(Cancelled));
    }

    #[test]
    fn terminal_states_are_final() {
        assert!(!Completed.can_transition_to(Scheduled));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Cancelled.can_transition_to(Cancelled));
        assert!(!Confirmed.can_transition_to(Scheduled));
    }
}
