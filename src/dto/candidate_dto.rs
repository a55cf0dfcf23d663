use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::dto::assessment_dto::decimal_to_f64;

pub const PIPELINE_STATUSES: &[&str] = &["applied", "in-review", "interviewed", "shortlisted", "rejected"];

fn validate_pipeline_status(value: &str) -> std::result::Result<(), validator::ValidationError> {
    crate::utils::validation::validate_one_of(value, PIPELINE_STATUSES, "invalid_status")
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateCandidateStatusPayload {
    #[validate(custom(function = "validate_pipeline_status"))]
    pub status: String,
}

/// Aggregates for one interviewee, as selected from the database.
#[derive(Debug, Clone, FromRow)]
pub struct CandidateRow {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub profile: JsonValue,
    pub status: Option<String>,
    pub assessments_total: i64,
    pub assessments_completed: i64,
    pub practice_completed: i64,
    pub interviews_total: i64,
    pub interviews_completed: i64,
    pub interviews_scheduled: i64,
    pub average_score: Option<Decimal>,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub total: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PracticeProgress {
    pub completed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterviewCounts {
    pub total: i64,
    pub completed: i64,
    pub scheduled: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateSummary {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub position: Option<String>,
    pub location: Option<String>,
    pub skills: Vec<String>,
    pub status: String,
    pub overall_score: Option<f64>,
    pub last_activity: Option<DateTime<Utc>>,
    pub assessments: Progress,
    pub test_assessments: Progress,
    pub practice_problems: PracticeProgress,
    pub interviews: InterviewCounts,
}

fn profile_str(profile: &JsonValue, key: &str) -> Option<String> {
    profile
        .get(key)
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

impl From<CandidateRow> for CandidateSummary {
    fn from(row: CandidateRow) -> Self {
        let skills = row
            .profile
            .get("skills")
            .and_then(JsonValue::as_array)
            .map(|a| a.iter().filter_map(|s| s.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let assessments = Progress {
            total: row.assessments_total,
            completed: row.assessments_completed,
        };
        Self {
            id: row.id,
            avatar: profile_str(&row.profile, "avatar"),
            position: profile_str(&row.profile, "position"),
            location: profile_str(&row.profile, "location"),
            skills,
            full_name: row.full_name,
            email: row.email,
            status: row.status.unwrap_or_else(|| "applied".to_string()),
            overall_score: row.average_score.map(|s| decimal_to_f64(s.round_dp(1))),
            last_activity: row.last_activity,
            test_assessments: assessments.clone(),
            assessments,
            practice_problems: PracticeProgress {
                completed: row.practice_completed,
            },
            interviews: InterviewCounts {
                total: row.interviews_total,
                completed: row.interviews_completed,
                scheduled: row.interviews_scheduled,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(profile: JsonValue, status: Option<&str>) -> CandidateRow {
        CandidateRow {
            id: Uuid::new_v4(),
            full_name: "Grace Hopper".into(),
            email: "grace@example.com".into(),
            profile,
            status: status.map(str::to_string),
            assessments_total: 3,
            assessments_completed: 2,
            practice_completed: 7,
            interviews_total: 1,
            interviews_completed: 0,
            interviews_scheduled: 1,
            average_score: Some(Decimal::new(8126, 2)),
            last_activity: None,
        }
    }

    #[test]
    fn missing_pipeline_row_reads_as_applied() {
        let summary = CandidateSummary::from(row(json!({}), None));
        assert_eq!(summary.status, "applied");
        assert!((summary.overall_score.unwrap() - 81.3).abs() < 1e-9);
    }

    #[test]
    fn profile_fields_are_lifted() {
        let summary = CandidateSummary::from(row(
            json!({"position": "SRE", "skills": ["rust", "go"], "avatar": ""}),
            Some("shortlisted"),
        ));
        assert_eq!(summary.position.as_deref(), Some("SRE"));
        assert_eq!(summary.skills, vec!["rust", "go"]);
        assert_eq!(summary.avatar, None);
        assert_eq!(summary.status, "shortlisted");
    }

    #[test]
    fn status_must_be_a_pipeline_stage() {
        let ok = UpdateCandidateStatusPayload { status: "in-review".into() };
        assert!(ok.validate().is_ok());
        let bad = UpdateCandidateStatusPayload { status: "hired".into() };
        assert!(bad.validate().is_err());
    }
}
