use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub profile: JsonValue,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Recruiter,
    Interviewee,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Recruiter => "recruiter",
            Role::Interviewee => "interviewee",
            Role::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "recruiter" => Some(Role::Recruiter),
            "interviewee" | "candidate" => Some(Role::Interviewee),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Recruiter pages are open to admins too.
    pub fn can_recruit(&self) -> bool {
        matches!(self, Role::Recruiter | Role::Admin)
    }
}

/// Caller identity resolved from the access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owners and admins may manage a recruiter-owned record.
    pub fn may_manage(&self, owner_id: Uuid) -> bool {
        self.is_admin() || self.id == owner_id
    }

    pub fn require_recruiter(&self) -> Result<()> {
        if self.role.can_recruit() {
            Ok(())
        } else {
            Err(Error::Forbidden("Recruiter access required".into()))
        }
    }

    pub fn require_interviewee(&self) -> Result<()> {
        if self.role == Role::Interviewee {
            Ok(())
        } else {
            Err(Error::Forbidden("Only candidates can do this".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_is_an_alias_for_interviewee() {
        assert_eq!(Role::parse("Candidate"), Some(Role::Interviewee));
        assert_eq!(Role::parse("hr"), None);
    }

    #[test]
    fn role_guards() {
        let admin = AuthUser { id: Uuid::new_v4(), role: Role::Admin };
        let candidate = AuthUser { id: Uuid::new_v4(), role: Role::Interviewee };
        assert!(admin.require_recruiter().is_ok());
        assert!(admin.require_interviewee().is_err());
        assert!(candidate.require_recruiter().is_err());
        assert!(admin.may_manage(candidate.id));
        assert!(!candidate.may_manage(admin.id));
    }
}
