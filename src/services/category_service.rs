use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::category_dto::CategoryPayload;
use crate::error::{is_unique_violation, Error, Result};
use crate::models::category::{Category, CategoryWithCounts};
use crate::services::audit_service::AuditService;

const CATEGORY_COLUMNS: &str = "id, name, description, created_by, created_at, updated_at";
const NAME_CONSTRAINT: &str = "categories_name_key";

#[derive(Clone)]
pub struct CategoryService {
    pool: PgPool,
    audit: AuditService,
}

impl CategoryService {
    pub fn new(pool: PgPool, audit: AuditService) -> Self {
        Self { pool, audit }
    }

    pub async fn list(&self) -> Result<Vec<CategoryWithCounts>> {
        let rows = sqlx::query_as::<_, CategoryWithCounts>(
            r#"SELECT c.id, c.name, c.description, c.created_at,
                      COUNT(p.id) AS problem_count,
                      COALESCE(SUM(p.points), 0)::bigint AS total_points
               FROM categories c
               LEFT JOIN practice_problems p ON p.category_id = c.id
               GROUP BY c.id
               ORDER BY c.name"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get(&self, id: Uuid) -> Result<Category> {
        sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Category not found".into()))
    }

    pub async fn create(&self, payload: CategoryPayload, created_by: Uuid) -> Result<Category> {
        let category = sqlx::query_as::<_, Category>(&format!(
            r#"INSERT INTO categories (name, description, created_by)
               VALUES ($1, $2, $3)
               RETURNING {CATEGORY_COLUMNS}"#
        ))
        .bind(payload.name.trim())
        .bind(payload.description_trimmed())
        .bind(created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(duplicate_name)?;

        tracing::info!(category_id = %category.id, name = %category.name, "category created");
        Ok(category)
    }

    pub async fn update(&self, id: Uuid, payload: CategoryPayload) -> Result<Category> {
        sqlx::query_as::<_, Category>(&format!(
            r#"UPDATE categories SET name = $2, description = $3, updated_at = NOW()
               WHERE id = $1
               RETURNING {CATEGORY_COLUMNS}"#
        ))
        .bind(id)
        .bind(payload.name.trim())
        .bind(payload.description_trimmed())
        .fetch_optional(&self.pool)
        .await
        .map_err(duplicate_name)?
        .ok_or_else(|| Error::NotFound("Category not found".into()))
    }

    /// Problems in the category are kept and become uncategorised.
    pub async fn delete(&self, id: Uuid, deleted_by: Uuid) -> Result<Category> {
        let category = self.get(id).await?;
        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        tracing::info!(category_id = %id, "category deleted");
        self.audit
            .record(
                deleted_by,
                "category_deleted",
                "category",
                id,
                Some(serde_json::json!({ "name": category.name })),
            )
            .await;
        Ok(category)
    }
}

fn duplicate_name(err: sqlx::Error) -> Error {
    if is_unique_violation(&err, NAME_CONSTRAINT) {
        Error::Conflict("A category with this name already exists".into())
    } else {
        err.into()
    }
}
