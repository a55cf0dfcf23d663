use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use validator::Validate;

use crate::error::{Error, Result};
use crate::models::user::Role;

/// Free-form profile keys the settings pages edit.
pub const PROFILE_KEYS: &[&str] = &[
    "phone",
    "position",
    "title",
    "bio",
    "timezone",
    "location",
    "avatar",
    "website",
    "linkedin",
    "github",
    "availability",
    "salary_expectation",
    "work_type",
    "skills",
    "company",
    "company_name",
    "industry",
    "company_size",
    "company_website",
    "company_description",
    "company_logo",
];

const RECRUITER_NOTIFICATIONS: &[(&str, bool)] = &[
    ("email_new_applications", true),
    ("email_assessment_completed", true),
    ("email_interview_reminders", true),
    ("push_new_applications", false),
    ("push_assessment_completed", true),
    ("push_interview_reminders", true),
    ("weekly_reports", true),
    ("monthly_analytics", false),
];

const INTERVIEWEE_NOTIFICATIONS: &[(&str, bool)] = &[
    ("email_new_opportunities", true),
    ("email_interview_invites", true),
    ("email_assessment_invites", true),
    ("email_results_updates", true),
    ("push_new_opportunities", false),
    ("push_interview_reminders", true),
    ("push_assessment_reminders", true),
    ("push_message_notifications", true),
    ("weekly_job_alerts", false),
    ("monthly_progress_reports", true),
];

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProfilePayload {
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, JsonValue>,
}

impl ProfilePayload {
    /// The new display name, when either part was sent.
    pub fn full_name(&self) -> Option<String> {
        if self.first_name.is_none() && self.last_name.is_none() {
            return None;
        }
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        (!name.is_empty()).then_some(name)
    }
}

/// Keeps known keys only. Skills may arrive comma-separated; they are stored as a list.
pub fn sanitize_profile(fields: &Map<String, JsonValue>) -> Result<Map<String, JsonValue>> {
    let mut out = Map::new();
    for (key, value) in fields {
        if !PROFILE_KEYS.contains(&key.as_str()) {
            continue;
        }
        let cleaned = match (key.as_str(), value) {
            ("skills", JsonValue::String(s)) => JsonValue::Array(
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| JsonValue::String(s.to_string()))
                    .collect(),
            ),
            ("skills", JsonValue::Array(items)) => JsonValue::Array(
                items
                    .iter()
                    .filter_map(|i| i.as_str().map(str::trim))
                    .filter(|s| !s.is_empty())
                    .map(|s| JsonValue::String(s.to_string()))
                    .collect(),
            ),
            (_, JsonValue::String(s)) => JsonValue::String(s.trim().to_string()),
            (_, JsonValue::Null) => JsonValue::Null,
            (_, JsonValue::Number(n)) => JsonValue::String(n.to_string()),
            _ => return Err(Error::BadRequest(format!("Profile field '{}' must be text", key))),
        };
        out.insert(key.clone(), cleaned);
    }
    Ok(out)
}

pub fn notification_defaults(role: Role) -> &'static [(&'static str, bool)] {
    match role {
        Role::Interviewee => INTERVIEWEE_NOTIFICATIONS,
        Role::Recruiter | Role::Admin => RECRUITER_NOTIFICATIONS,
    }
}

/// Stored preferences over the role's defaults. Unknown stored keys are dropped.
pub fn effective_notifications(role: Role, stored: &JsonValue) -> Map<String, JsonValue> {
    notification_defaults(role)
        .iter()
        .map(|(key, default)| {
            let value = stored.get(*key).and_then(JsonValue::as_bool).unwrap_or(*default);
            (key.to_string(), JsonValue::Bool(value))
        })
        .collect()
}

/// Applies an update to the effective preferences. Every key must be known and boolean.
pub fn apply_notifications(
    role: Role,
    stored: &JsonValue,
    update: &Map<String, JsonValue>,
) -> Result<Map<String, JsonValue>> {
    let mut settings = effective_notifications(role, stored);
    for (key, value) in update {
        if !settings.contains_key(key) {
            return Err(Error::BadRequest(format!("Unknown notification setting '{}'", key)));
        }
        let flag = value
            .as_bool()
            .ok_or_else(|| Error::BadRequest(format!("Notification setting '{}' must be true or false", key)))?;
        settings.insert(key.clone(), JsonValue::Bool(flag));
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn skills_string_becomes_list() {
        let fields = json!({"skills": "rust, sql,, go", "bio": "  hi ", "password": "x"});
        let clean = sanitize_profile(fields.as_object().unwrap()).unwrap();
        assert_eq!(clean["skills"], json!(["rust", "sql", "go"]));
        assert_eq!(clean["bio"], json!("hi"));
        assert!(!clean.contains_key("password"));
    }

    #[test]
    fn nested_objects_are_rejected() {
        let fields = json!({"location": {"city": "Almaty"}});
        assert!(sanitize_profile(fields.as_object().unwrap()).is_err());
    }

    #[test]
    fn full_name_joins_parts() {
        let payload: ProfilePayload =
            serde_json::from_value(json!({"first_name": "Ada", "last_name": " Lovelace "})).unwrap();
        assert_eq!(payload.full_name().as_deref(), Some("Ada Lovelace"));
        let untouched: ProfilePayload = serde_json::from_value(json!({"bio": "x"})).unwrap();
        assert_eq!(untouched.full_name(), None);
    }

    #[test]
    fn notifications_fall_back_to_role_defaults() {
        let settings = effective_notifications(Role::Recruiter, &json!({"weekly_reports": false}));
        assert_eq!(settings["weekly_reports"], json!(false));
        assert_eq!(settings["email_new_applications"], json!(true));
        assert!(!settings.contains_key("weekly_job_alerts"));
    }

    #[test]
    fn notification_update_checks_keys_and_types() {
        let update = json!({"weekly_job_alerts": true});
        let merged = apply_notifications(Role::Interviewee, &json!({}), update.as_object().unwrap()).unwrap();
        assert_eq!(merged["weekly_job_alerts"], json!(true));

        let unknown = json!({"sms": true});
        assert!(apply_notifications(Role::Interviewee, &json!({}), unknown.as_object().unwrap()).is_err());
        let not_bool = json!({"weekly_job_alerts": "yes"});
        assert!(apply_notifications(Role::Interviewee, &json!({}), not_bool.as_object().unwrap()).is_err());
    }
}
