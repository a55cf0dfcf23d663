use serde_json::{json, Map, Value as JsonValue};
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::interview_dto::split_name;
use crate::dto::profile_dto::{apply_notifications, effective_notifications, sanitize_profile, ProfilePayload};
use crate::error::{is_unique_violation, Error, Result};
use crate::models::user::{AuthUser, User};

/// Profile document as the settings pages read it: account fields plus stored profile keys.
pub fn profile_json(user: &User) -> JsonValue {
    let (first_name, last_name) = split_name(&user.full_name);
    let mut out = user.profile.as_object().cloned().unwrap_or_default();
    out.insert("id".into(), json!(user.id));
    out.insert("email".into(), json!(user.email));
    out.insert("full_name".into(), json!(user.full_name));
    out.insert("first_name".into(), json!(first_name));
    out.insert("last_name".into(), json!(last_name));
    out.insert("role".into(), json!(user.role));
    out.insert("created_at".into(), json!(user.created_at));
    JsonValue::Object(out)
}

#[derive(Clone)]
pub struct ProfileService {
    pool: PgPool,
}

impl ProfileService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn user(&self, id: Uuid) -> Result<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, full_name, role, profile, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("User not found".into()))
    }

    pub async fn get(&self, user: &AuthUser) -> Result<JsonValue> {
        Ok(profile_json(&self.user(user.id).await?))
    }

    pub async fn update(&self, user: &AuthUser, payload: ProfilePayload) -> Result<JsonValue> {
        let fields = sanitize_profile(&payload.fields)?;
        let full_name = payload.full_name();
        let email = payload
            .email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());

        let updated = sqlx::query_as::<_, User>(
            r#"UPDATE users SET
                   full_name = COALESCE($2, full_name),
                   email = COALESCE($3, email),
                   profile = profile || $4,
                   updated_at = NOW()
               WHERE id = $1
               RETURNING id, email, full_name, role, profile, created_at"#,
        )
        .bind(user.id)
        .bind(full_name)
        .bind(email)
        .bind(JsonValue::Object(fields))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "users_email_key") {
                Error::Conflict("Email is already in use".into())
            } else {
                e.into()
            }
        })?
        .ok_or_else(|| Error::NotFound("User not found".into()))?;

        tracing::info!(user_id = %user.id, "profile updated");
        Ok(profile_json(&updated))
    }

    pub async fn notifications(&self, user: &AuthUser) -> Result<Map<String, JsonValue>> {
        let stored = self.stored_notifications(user.id).await?;
        Ok(effective_notifications(user.role, &stored))
    }

    pub async fn update_notifications(
        &self,
        user: &AuthUser,
        update: Map<String, JsonValue>,
    ) -> Result<Map<String, JsonValue>> {
        let stored = self.stored_notifications(user.id).await?;
        let settings = apply_notifications(user.role, &stored, &update)?;
        sqlx::query("UPDATE users SET notification_settings = $2, updated_at = NOW() WHERE id = $1")
            .bind(user.id)
            .bind(JsonValue::Object(settings.clone()))
            .execute(&self.pool)
            .await?;
        Ok(settings)
    }

    async fn stored_notifications(&self, id: Uuid) -> Result<JsonValue> {
        sqlx::query_scalar::<_, JsonValue>("SELECT notification_settings FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn profile_json_merges_account_and_profile() {
        let user = User {
            id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            full_name: "Ada Lovelace".into(),
            role: "recruiter".into(),
            profile: json!({"company_name": "Analytical Engines", "email": "stale@example.com"}),
            created_at: Utc::now(),
        };
        let doc = profile_json(&user);
        assert_eq!(doc["first_name"], "Ada");
        assert_eq!(doc["last_name"], "Lovelace");
        assert_eq!(doc["company_name"], "Analytical Engines");
        assert_eq!(doc["email"], "ada@example.com");
    }
}
