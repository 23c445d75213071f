//! Repository for the `licenses` table.
//!
//! `activate` and `bind_machine` are the two operations with concurrency
//! requirements: activation runs in a transaction with a row lock so two
//! racing activations of the same key resolve to exactly one winner, and
//! machine binding is a single conditional UPDATE.

use beamline_core::license::expiry_from;
use beamline_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::ledger::{ActivationOutcome, MachineBinding};
use crate::models::{License, NewLicense};

/// Column list shared across queries (`license_key` surfaces as `key`).
const COLUMNS: &str = "id, license_key AS key, user_id, plan_name, price, duration_days, \
                       status, machine_id, activated_at, expires_at, last_active_at, created_at";

/// Provides operations for licenses.
pub struct LicenseRepo;

impl LicenseRepo {
    /// Insert a freshly issued license with status `unused`.
    ///
    /// A key collision surfaces as a unique-constraint violation
    /// (`uq_licenses_key`); the caller retries with a new key.
    pub async fn insert(pool: &PgPool, input: &NewLicense) -> Result<License, sqlx::Error> {
        let query = format!(
            "INSERT INTO licenses (license_key, plan_name, price, duration_days)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, License>(&query)
            .bind(&input.key)
            .bind(&input.plan_name)
            .bind(input.price)
            .bind(input.duration_days)
            .fetch_one(pool)
            .await
    }

    /// Find a license by its key.
    pub async fn find_by_key(pool: &PgPool, key: &str) -> Result<Option<License>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM licenses WHERE license_key = $1");
        sqlx::query_as::<_, License>(&query)
            .bind(key)
            .fetch_optional(pool)
            .await
    }

    /// List all licenses, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<License>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM licenses ORDER BY created_at DESC");
        sqlx::query_as::<_, License>(&query).fetch_all(pool).await
    }

    /// Activate a license for a user, atomically.
    ///
    /// Inside one transaction: lock the license row, check it is still
    /// `unused`, stamp owner/activation/expiry/status, and mirror the key
    /// and expiry onto the user row. Concurrent activations of the same
    /// key serialize on the row lock; the loser observes `AlreadyUsed`.
    pub async fn activate(
        pool: &PgPool,
        key: &str,
        user_id: DbId,
        now: Timestamp,
    ) -> Result<ActivationOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!("SELECT {COLUMNS} FROM licenses WHERE license_key = $1 FOR UPDATE");
        let license = sqlx::query_as::<_, License>(&query)
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(license) = license else {
            return Ok(ActivationOutcome::NotFound);
        };
        if license.status != "unused" {
            return Ok(ActivationOutcome::AlreadyUsed);
        }

        let expires_at = expiry_from(now, license.duration_days);

        let query = format!(
            "UPDATE licenses
             SET user_id = $2, activated_at = $3, expires_at = $4, status = 'active'
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let activated = sqlx::query_as::<_, License>(&query)
            .bind(license.id)
            .bind(user_id)
            .bind(now)
            .bind(expires_at)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE users SET license_key = $2, license_expires_at = $3 WHERE id = $1")
            .bind(user_id)
            .bind(key)
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ActivationOutcome::Activated(activated))
    }

    /// Bind a license to a machine fingerprint and touch `last_active_at`.
    ///
    /// The first verification binds; later verifications must present the
    /// same fingerprint. A single conditional UPDATE keeps the
    /// check-and-set race-free.
    pub async fn bind_machine(
        pool: &PgPool,
        key: &str,
        machine_id: &str,
        now: Timestamp,
    ) -> Result<MachineBinding, sqlx::Error> {
        let query = format!(
            "UPDATE licenses
             SET machine_id = $2, last_active_at = $3
             WHERE license_key = $1 AND (machine_id IS NULL OR machine_id = $2)
             RETURNING {COLUMNS}"
        );
        let bound = sqlx::query_as::<_, License>(&query)
            .bind(key)
            .bind(machine_id)
            .bind(now)
            .fetch_optional(pool)
            .await?;

        if let Some(license) = bound {
            return Ok(MachineBinding::Bound(license));
        }

        // No row updated: either the key is unknown or it is bound elsewhere.
        let exists = sqlx::query("SELECT 1 FROM licenses WHERE license_key = $1")
            .bind(key)
            .fetch_optional(pool)
            .await?
            .is_some();

        Ok(if exists {
            MachineBinding::Mismatch
        } else {
            MachineBinding::NotFound
        })
    }

    /// Expire every active license whose expiry is in the past.
    ///
    /// Idempotent by construction: the `status = 'active'` guard means a
    /// second run in a row matches zero rows.
    pub async fn expire_before(pool: &PgPool, now: Timestamp) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("UPDATE licenses SET status = 'expired' WHERE status = 'active' AND expires_at < $1")
                .bind(now)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }
}
