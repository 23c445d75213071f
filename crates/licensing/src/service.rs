//! [`LicenseService`]: issue, activate, verify, sweep.
//!
//! The atomic parts of activation and machine binding live in the ledger
//! (each backend brings its own locking); this service owns the domain
//! rules around them -- status lifecycle, lazy expiry, the offline-grace
//! window -- and publishes license events on the bus.

use std::sync::Arc;

use beamline_core::license::{
    generate_key, is_expired, within_grace_window, LicenseStatus,
};
use beamline_core::types::{DbId, Timestamp};
use beamline_db::ledger::{ActivationOutcome, Ledger, LedgerError, MachineBinding};
use beamline_db::models::{License, NewLicense, User};
use beamline_events::{EventBus, PlatformEvent};
use serde::Serialize;

use crate::grace::{GraceCache, GraceEntry};

/// Attempts at generating a collision-free key before giving up.
const MAX_KEY_ATTEMPTS: u32 = 5;

/// License-domain failures.
#[derive(Debug, thiserror::Error)]
pub enum LicenseError {
    #[error("License key not found")]
    NotFound,

    #[error("License key has already been used")]
    AlreadyUsed,

    #[error("License key has not been activated")]
    NotActivated,

    #[error("License has expired")]
    Expired,

    #[error("License is bound to a different machine")]
    MachineMismatch,

    /// Ledger unreachable and no grace window applies (or it ran out).
    #[error("License store unreachable")]
    StoreUnavailable,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Successful activation: the terms now fixed on the license.
#[derive(Debug, Clone, Serialize)]
pub struct ActivatedLicense {
    pub key: String,
    pub expires_at: Timestamp,
}

/// Successful verification.
#[derive(Debug)]
pub enum Verification {
    /// Verified online against the ledger.
    Valid { user: User, expires_at: Timestamp },
    /// Ledger unreachable, but a prior verification is inside the grace
    /// window. Callers should surface the degraded mode to the user.
    OfflineGrace {
        user_id: DbId,
        expires_at: Option<Timestamp>,
        last_verified: Timestamp,
    },
}

/// Read-only license summary for a user (status queries).
#[derive(Debug, Clone, Serialize)]
pub struct LicenseSummary {
    pub key: Option<String>,
    pub status: Option<String>,
    pub expires_at: Option<Timestamp>,
}

/// The License Coordinator. One per process, cheaply shared via `Arc`.
pub struct LicenseService {
    ledger: Arc<dyn Ledger>,
    bus: Arc<EventBus>,
    grace: GraceCache,
}

impl LicenseService {
    pub fn new(ledger: Arc<dyn Ledger>, bus: Arc<EventBus>) -> Self {
        Self {
            ledger,
            bus,
            grace: GraceCache::new(),
        }
    }

    /// Issue a new license with fixed terms, status `unused`.
    ///
    /// Key generation retries on a ledger collision; the key space makes
    /// that essentially free, but the contract does not trust the odds.
    pub async fn issue(
        &self,
        plan_name: &str,
        price: i32,
        duration_days: i32,
    ) -> Result<License, LicenseError> {
        if plan_name.trim().is_empty() {
            return Err(LicenseError::Validation("plan name must not be empty".into()));
        }
        if price < 0 {
            return Err(LicenseError::Validation("price must not be negative".into()));
        }
        if duration_days < 1 {
            return Err(LicenseError::Validation(
                "duration must be at least one day".into(),
            ));
        }

        for attempt in 1..=MAX_KEY_ATTEMPTS {
            let new = NewLicense {
                key: generate_key(),
                plan_name: plan_name.trim().to_string(),
                price,
                duration_days,
            };
            match self.ledger.insert_license(new).await {
                Ok(license) => {
                    tracing::info!(key = %license.key, plan = %license.plan_name, "License issued");
                    return Ok(license);
                }
                Err(LedgerError::DuplicateKey) => {
                    tracing::warn!(attempt, "License key collision; regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(LicenseError::Internal(
            "could not generate a unique license key".into(),
        ))
    }

    /// Activate `key` for `user_id`.
    ///
    /// At most one activation per key, ever: the ledger decides the winner
    /// atomically and everyone else observes `AlreadyUsed`.
    pub async fn activate(
        &self,
        key: &str,
        user_id: DbId,
        now: Timestamp,
    ) -> Result<ActivatedLicense, LicenseError> {
        match self.ledger.activate_license(key, user_id, now).await? {
            ActivationOutcome::NotFound => Err(LicenseError::NotFound),
            ActivationOutcome::AlreadyUsed => Err(LicenseError::AlreadyUsed),
            ActivationOutcome::Activated(license) => {
                let expires_at = license.expires_at.ok_or_else(|| {
                    LicenseError::Internal("activated license missing expiry".into())
                })?;
                tracing::info!(key = %license.key, user_id, "License activated");
                self.bus
                    .publish(PlatformEvent::license_activated(&license.key, user_id, expires_at));
                Ok(ActivatedLicense {
                    key: license.key,
                    expires_at,
                })
            }
        }
    }

    /// Verify `key` for the machine presenting `machine_id`.
    ///
    /// Online: checks the lifecycle (lazy expiry included), binds or
    /// matches the machine, touches the heartbeat, and refreshes the
    /// grace cache. Ledger unreachable: falls back to the grace window.
    pub async fn verify(
        &self,
        key: &str,
        machine_id: &str,
        now: Timestamp,
    ) -> Result<Verification, LicenseError> {
        let license = match self.ledger.find_license_by_key(key).await {
            Ok(license) => license,
            Err(e) => {
                tracing::warn!(error = %e, "Ledger unreachable; trying offline grace");
                return self.verify_offline(key, machine_id, now).await;
            }
        };

        let Some(license) = license else {
            return Err(LicenseError::NotFound);
        };

        let status = LicenseStatus::parse(&license.status).map_err(LicenseError::Internal)?;
        match status {
            LicenseStatus::Unused => return Err(LicenseError::NotActivated),
            LicenseStatus::Expired => {
                self.grace.forget(key).await;
                return Err(LicenseError::Expired);
            }
            LicenseStatus::Active => {}
        }

        let expires_at = license
            .expires_at
            .ok_or_else(|| LicenseError::Internal("active license missing expiry".into()))?;

        // Lazy expiry: the stored status may trail the clock.
        if is_expired(expires_at, now) {
            if let Err(e) = self.ledger.expire_licenses(now).await {
                tracing::error!(error = %e, "Failed to sweep expirations during verify");
            }
            self.grace.forget(key).await;
            return Err(LicenseError::Expired);
        }

        let license = match self.ledger.bind_machine(key, machine_id, now).await? {
            MachineBinding::NotFound => return Err(LicenseError::NotFound),
            MachineBinding::Mismatch => return Err(LicenseError::MachineMismatch),
            MachineBinding::Bound(license) => license,
        };

        let user_id = license
            .user_id
            .ok_or_else(|| LicenseError::Internal("active license missing owner".into()))?;
        let user = self
            .ledger
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| LicenseError::Internal("license owner no longer exists".into()))?;

        self.grace
            .record(
                key,
                GraceEntry {
                    user_id,
                    expires_at: Some(expires_at),
                    machine_id: machine_id.to_string(),
                    last_verified: now,
                },
            )
            .await;

        Ok(Verification::Valid { user, expires_at })
    }

    /// Expire every active license past its expiry. Idempotent; safe on
    /// every login and on the periodic timer.
    pub async fn sweep_expirations(&self, now: Timestamp) -> Result<u64, LicenseError> {
        let expired = self.ledger.expire_licenses(now).await?;
        if expired > 0 {
            tracing::info!(expired, "Expired licenses swept");
        }
        Ok(expired)
    }

    /// Read-only license summary for a user.
    pub async fn summary(&self, user_id: DbId) -> Result<LicenseSummary, LicenseError> {
        let user = self
            .ledger
            .find_user_by_id(user_id)
            .await?
            .ok_or(LicenseError::NotFound)?;

        let Some(key) = user.license_key else {
            return Ok(LicenseSummary {
                key: None,
                status: None,
                expires_at: None,
            });
        };

        let license = self.ledger.find_license_by_key(&key).await?;
        Ok(LicenseSummary {
            status: license.as_ref().map(|l| l.status.clone()),
            expires_at: license.and_then(|l| l.expires_at),
            key: Some(key),
        })
    }

    // ---- internals ----

    /// Grace path: the ledger is unreachable, fall back to the cache of
    /// prior verifications, bounded by the grace window. Fail closed on
    /// anything that does not match exactly.
    async fn verify_offline(
        &self,
        key: &str,
        machine_id: &str,
        now: Timestamp,
    ) -> Result<Verification, LicenseError> {
        let Some(entry) = self.grace.lookup(key).await else {
            return Err(LicenseError::StoreUnavailable);
        };
        if entry.machine_id != machine_id {
            return Err(LicenseError::MachineMismatch);
        }
        if let Some(expires_at) = entry.expires_at {
            if is_expired(expires_at, now) {
                return Err(LicenseError::Expired);
            }
        }
        if !within_grace_window(entry.last_verified, now) {
            return Err(LicenseError::StoreUnavailable);
        }

        tracing::warn!(key, "License verified via offline grace window");
        Ok(Verification::OfflineGrace {
            user_id: entry.user_id,
            expires_at: entry.expires_at,
            last_verified: entry.last_verified,
        })
    }
}
