//! Abstraction over the durable store.
//!
//! The session, license, and dispatch coordinators consume the [`Ledger`]
//! trait; they never know whether PostgreSQL ([`PgLedger`]) or the
//! in-memory fallback ([`MemoryLedger`]) is behind it. The trait carries
//! the two atomic compound operations (`activate_license`,
//! `bind_machine`) so each backend can uphold the concurrency contract
//! with its own locking primitive.

use async_trait::async_trait;
use beamline_core::types::{DbId, Timestamp};

use crate::models::{
    DispatchOutcome, License, NewLicense, NewOutcome, NewTemplate, NewUser, OutcomeStats, Setting,
    Template, UpdateTemplate, User,
};

pub mod memory;
pub mod pg;

pub use memory::MemoryLedger;
pub use pg::PgLedger;

/// Storage-level failures.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A user with this email already exists.
    #[error("Email already registered")]
    DuplicateEmail,

    /// A license with this key already exists (generation collision).
    #[error("License key already exists")]
    DuplicateKey,

    /// The backing store cannot be reached right now.
    #[error("Store unreachable: {0}")]
    Unavailable(String),

    /// Any other database failure.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of an activation attempt, decided atomically by the store.
#[derive(Debug)]
pub enum ActivationOutcome {
    /// The caller won the activation; the returned row is `active`.
    Activated(License),
    /// No license with that key exists.
    NotFound,
    /// The license left `unused` before this attempt.
    AlreadyUsed,
}

/// Result of a machine-binding attempt.
#[derive(Debug)]
pub enum MachineBinding {
    /// The fingerprint matches (or the license was unbound and is now
    /// bound to it); `last_active_at` was touched.
    Bound(License),
    /// The license is bound to a different machine. No re-bind.
    Mismatch,
    /// No license with that key exists.
    NotFound,
}

/// The durable-store operations the coordinators depend on.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Short backend name for health reporting (`"postgres"` / `"memory"`).
    fn backend(&self) -> &'static str;

    /// Liveness probe.
    async fn health(&self) -> Result<(), LedgerError>;

    // ---- users ----

    async fn create_user(&self, new: NewUser) -> Result<User, LedgerError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, LedgerError>;
    async fn find_user_by_id(&self, id: DbId) -> Result<Option<User>, LedgerError>;
    async fn list_users(&self) -> Result<Vec<User>, LedgerError>;

    // ---- licenses ----

    async fn insert_license(&self, new: NewLicense) -> Result<License, LedgerError>;
    async fn find_license_by_key(&self, key: &str) -> Result<Option<License>, LedgerError>;
    async fn list_licenses(&self) -> Result<Vec<License>, LedgerError>;

    /// Atomically activate `key` for `user_id` and mirror the key/expiry
    /// onto the user. Concurrent attempts on the same key yield exactly
    /// one `Activated`.
    async fn activate_license(
        &self,
        key: &str,
        user_id: DbId,
        now: Timestamp,
    ) -> Result<ActivationOutcome, LedgerError>;

    /// First verification binds the machine fingerprint; later ones must
    /// match. Touches `last_active_at` on success.
    async fn bind_machine(
        &self,
        key: &str,
        machine_id: &str,
        now: Timestamp,
    ) -> Result<MachineBinding, LedgerError>;

    /// Expire every active license past its expiry. Returns rows changed.
    async fn expire_licenses(&self, now: Timestamp) -> Result<u64, LedgerError>;

    // ---- templates ----

    async fn create_template(&self, new: NewTemplate) -> Result<Template, LedgerError>;
    async fn list_templates(&self) -> Result<Vec<Template>, LedgerError>;
    async fn update_template(
        &self,
        id: DbId,
        update: UpdateTemplate,
    ) -> Result<Option<Template>, LedgerError>;
    async fn delete_template(&self, id: DbId) -> Result<bool, LedgerError>;

    // ---- dispatch outcomes ----

    async fn record_outcome(&self, outcome: NewOutcome) -> Result<(), LedgerError>;
    async fn recent_outcomes(&self, limit: i64) -> Result<Vec<DispatchOutcome>, LedgerError>;
    async fn outcome_stats(&self) -> Result<OutcomeStats, LedgerError>;

    // ---- settings ----

    async fn settings(&self) -> Result<Vec<Setting>, LedgerError>;
    async fn put_setting(&self, key: &str, value: &str) -> Result<(), LedgerError>;
}
