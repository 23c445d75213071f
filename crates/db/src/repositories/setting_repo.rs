//! Repository for the `settings` table.

use sqlx::PgPool;

use crate::models::Setting;

const COLUMNS: &str = "setting_key AS key, setting_value AS value";

/// Provides operations for operator settings.
pub struct SettingRepo;

impl SettingRepo {
    /// All settings as rows.
    pub async fn all(pool: &PgPool) -> Result<Vec<Setting>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM settings ORDER BY setting_key");
        sqlx::query_as::<_, Setting>(&query).fetch_all(pool).await
    }

    /// Insert or overwrite one setting.
    pub async fn upsert(pool: &PgPool, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO settings (setting_key, setting_value) VALUES ($1, $2)
             ON CONFLICT (setting_key) DO UPDATE SET setting_value = EXCLUDED.setting_value",
        )
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
        Ok(())
    }
}
