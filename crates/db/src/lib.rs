//! Durable store for the Beamline platform.
//!
//! PostgreSQL via sqlx is the primary backend (`repositories` +
//! [`ledger::PgLedger`]). When the database is unreachable at startup the
//! process falls back to the best-effort [`ledger::MemoryLedger`], seeded
//! with a single administrative account, so the dispatch side of the
//! product stays usable. Coordinators depend only on the [`ledger::Ledger`]
//! trait and never see which backend is live.

use sqlx::postgres::PgPoolOptions;

pub mod ledger;
pub mod models;
pub mod repositories;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Cheap liveness probe (`SELECT 1`).
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply any pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!().run(pool).await
}
