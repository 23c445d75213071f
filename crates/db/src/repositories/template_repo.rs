//! Repository for the `templates` table.

use beamline_core::types::DbId;
use sqlx::PgPool;

use crate::models::{NewTemplate, Template, UpdateTemplate};

const COLUMNS: &str = "id, name, message, created_at";

/// Provides CRUD operations for message templates.
pub struct TemplateRepo;

impl TemplateRepo {
    /// Insert a new template, returning the created row.
    pub async fn create(pool: &PgPool, input: &NewTemplate) -> Result<Template, sqlx::Error> {
        let query = format!(
            "INSERT INTO templates (name, message) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Template>(&query)
            .bind(&input.name)
            .bind(&input.message)
            .fetch_one(pool)
            .await
    }

    /// List all templates, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<Template>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM templates ORDER BY created_at DESC");
        sqlx::query_as::<_, Template>(&query).fetch_all(pool).await
    }

    /// Update name and message. Returns `None` if no row with `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateTemplate,
    ) -> Result<Option<Template>, sqlx::Error> {
        let query = format!(
            "UPDATE templates SET name = $2, message = $3 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Template>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.message)
            .fetch_optional(pool)
            .await
    }

    /// Delete a template. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
