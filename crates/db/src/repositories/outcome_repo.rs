//! Repository for the `dispatch_outcomes` table (the message log).

use sqlx::PgPool;

use crate::models::{DispatchOutcome, NewOutcome, OutcomeStats};

const COLUMNS: &str = "id, recipient, template_id, resolved_message, status, error, created_at";

/// Provides operations for dispatch outcome records.
pub struct OutcomeRepo;

impl OutcomeRepo {
    /// Insert one outcome row.
    pub async fn insert(pool: &PgPool, input: &NewOutcome) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO dispatch_outcomes (recipient, template_id, resolved_message, status, error)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&input.recipient)
        .bind(input.template_id)
        .bind(&input.resolved_message)
        .bind(&input.status)
        .bind(&input.error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Most recent outcomes, newest first.
    pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<DispatchOutcome>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM dispatch_outcomes ORDER BY created_at DESC LIMIT $1"
        );
        sqlx::query_as::<_, DispatchOutcome>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Aggregate sent/failed counts over the whole log.
    pub async fn stats(pool: &PgPool) -> Result<OutcomeStats, sqlx::Error> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM dispatch_outcomes GROUP BY status")
                .fetch_all(pool)
                .await?;

        let mut stats = OutcomeStats::default();
        for (status, count) in rows {
            match status.as_str() {
                "sent" => stats.sent = count,
                "failed" => stats.failed = count,
                _ => {}
            }
            stats.total += count;
        }
        Ok(stats)
    }
}
