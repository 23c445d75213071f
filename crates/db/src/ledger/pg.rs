//! PostgreSQL-backed [`Ledger`] delegating to the repositories.
//!
//! Unique-constraint violations are classified by constraint name
//! (`uq_users_email`, `uq_licenses_key`) into the dedicated
//! [`LedgerError`] variants so callers can react without parsing
//! database error strings.

use async_trait::async_trait;
use beamline_core::types::{DbId, Timestamp};

use crate::models::{
    DispatchOutcome, License, NewLicense, NewOutcome, NewTemplate, NewUser, OutcomeStats, Setting,
    Template, UpdateTemplate, User,
};
use crate::repositories::{LicenseRepo, OutcomeRepo, SettingRepo, TemplateRepo, UserRepo};
use crate::DbPool;

use super::{ActivationOutcome, Ledger, LedgerError, MachineBinding};

/// The production ledger.
pub struct PgLedger {
    pool: DbPool,
}

impl PgLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for plumbing that still needs raw access.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Map a unique-constraint violation (PostgreSQL error 23505) to the
/// matching [`LedgerError`] variant; pass everything else through.
fn classify(err: sqlx::Error) -> LedgerError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            match db_err.constraint() {
                Some("uq_users_email") => return LedgerError::DuplicateEmail,
                Some("uq_licenses_key") => return LedgerError::DuplicateKey,
                _ => {}
            }
        }
    }
    LedgerError::Database(err)
}

#[async_trait]
impl Ledger for PgLedger {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn health(&self) -> Result<(), LedgerError> {
        crate::health_check(&self.pool)
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))
    }

    // ---- users ----

    async fn create_user(&self, new: NewUser) -> Result<User, LedgerError> {
        UserRepo::create(&self.pool, &new).await.map_err(classify)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, LedgerError> {
        Ok(UserRepo::find_by_email(&self.pool, email).await?)
    }

    async fn find_user_by_id(&self, id: DbId) -> Result<Option<User>, LedgerError> {
        Ok(UserRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_users(&self) -> Result<Vec<User>, LedgerError> {
        Ok(UserRepo::list(&self.pool).await?)
    }

    // ---- licenses ----

    async fn insert_license(&self, new: NewLicense) -> Result<License, LedgerError> {
        LicenseRepo::insert(&self.pool, &new).await.map_err(classify)
    }

    async fn find_license_by_key(&self, key: &str) -> Result<Option<License>, LedgerError> {
        Ok(LicenseRepo::find_by_key(&self.pool, key).await?)
    }

    async fn list_licenses(&self) -> Result<Vec<License>, LedgerError> {
        Ok(LicenseRepo::list(&self.pool).await?)
    }

    async fn activate_license(
        &self,
        key: &str,
        user_id: DbId,
        now: Timestamp,
    ) -> Result<ActivationOutcome, LedgerError> {
        Ok(LicenseRepo::activate(&self.pool, key, user_id, now).await?)
    }

    async fn bind_machine(
        &self,
        key: &str,
        machine_id: &str,
        now: Timestamp,
    ) -> Result<MachineBinding, LedgerError> {
        Ok(LicenseRepo::bind_machine(&self.pool, key, machine_id, now).await?)
    }

    async fn expire_licenses(&self, now: Timestamp) -> Result<u64, LedgerError> {
        Ok(LicenseRepo::expire_before(&self.pool, now).await?)
    }

    // ---- templates ----

    async fn create_template(&self, new: NewTemplate) -> Result<Template, LedgerError> {
        Ok(TemplateRepo::create(&self.pool, &new).await?)
    }

    async fn list_templates(&self) -> Result<Vec<Template>, LedgerError> {
        Ok(TemplateRepo::list(&self.pool).await?)
    }

    async fn update_template(
        &self,
        id: DbId,
        update: UpdateTemplate,
    ) -> Result<Option<Template>, LedgerError> {
        Ok(TemplateRepo::update(&self.pool, id, &update).await?)
    }

    async fn delete_template(&self, id: DbId) -> Result<bool, LedgerError> {
        Ok(TemplateRepo::delete(&self.pool, id).await?)
    }

    // ---- dispatch outcomes ----

    async fn record_outcome(&self, outcome: NewOutcome) -> Result<(), LedgerError> {
        Ok(OutcomeRepo::insert(&self.pool, &outcome).await?)
    }

    async fn recent_outcomes(&self, limit: i64) -> Result<Vec<DispatchOutcome>, LedgerError> {
        Ok(OutcomeRepo::recent(&self.pool, limit).await?)
    }

    async fn outcome_stats(&self) -> Result<OutcomeStats, LedgerError> {
        Ok(OutcomeRepo::stats(&self.pool).await?)
    }

    // ---- settings ----

    async fn settings(&self) -> Result<Vec<Setting>, LedgerError> {
        Ok(SettingRepo::all(&self.pool).await?)
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), LedgerError> {
        Ok(SettingRepo::upsert(&self.pool, key, value).await?)
    }
}
