//! Integration tests for the License Coordinator over the in-memory
//! ledger, including the full issue -> activate -> verify -> expire
//! lifecycle and the offline-grace fallback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use beamline_core::types::{DbId, Timestamp};
use beamline_db::ledger::{
    ActivationOutcome, Ledger, LedgerError, MachineBinding, MemoryLedger,
};
use beamline_db::models::{
    DispatchOutcome, License, NewLicense, NewOutcome, NewTemplate, NewUser, OutcomeStats, Setting,
    Template, UpdateTemplate, User,
};
use beamline_events::EventBus;
use beamline_licensing::{LicenseError, LicenseService, Verification};
use chrono::{Duration, Utc};

// ---------------------------------------------------------------------------
// Ledger wrapper with a switchable outage
// ---------------------------------------------------------------------------

/// Delegates to a [`MemoryLedger`] until `offline` is flipped; from then
/// on every call fails as unreachable.
struct FlakyLedger {
    inner: MemoryLedger,
    offline: AtomicBool,
}

impl FlakyLedger {
    fn new() -> Self {
        Self {
            inner: MemoryLedger::new(),
            offline: AtomicBool::new(false),
        }
    }

    fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    fn guard(&self) -> Result<(), LedgerError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(LedgerError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Ledger for FlakyLedger {
    fn backend(&self) -> &'static str {
        "flaky"
    }

    async fn health(&self) -> Result<(), LedgerError> {
        self.guard()
    }

    async fn create_user(&self, new: NewUser) -> Result<User, LedgerError> {
        self.guard()?;
        self.inner.create_user(new).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, LedgerError> {
        self.guard()?;
        self.inner.find_user_by_email(email).await
    }

    async fn find_user_by_id(&self, id: DbId) -> Result<Option<User>, LedgerError> {
        self.guard()?;
        self.inner.find_user_by_id(id).await
    }

    async fn list_users(&self) -> Result<Vec<User>, LedgerError> {
        self.guard()?;
        self.inner.list_users().await
    }

    async fn insert_license(&self, new: NewLicense) -> Result<License, LedgerError> {
        self.guard()?;
        self.inner.insert_license(new).await
    }

    async fn find_license_by_key(&self, key: &str) -> Result<Option<License>, LedgerError> {
        self.guard()?;
        self.inner.find_license_by_key(key).await
    }

    async fn list_licenses(&self) -> Result<Vec<License>, LedgerError> {
        self.guard()?;
        self.inner.list_licenses().await
    }

    async fn activate_license(
        &self,
        key: &str,
        user_id: DbId,
        now: Timestamp,
    ) -> Result<ActivationOutcome, LedgerError> {
        self.guard()?;
        self.inner.activate_license(key, user_id, now).await
    }

    async fn bind_machine(
        &self,
        key: &str,
        machine_id: &str,
        now: Timestamp,
    ) -> Result<MachineBinding, LedgerError> {
        self.guard()?;
        self.inner.bind_machine(key, machine_id, now).await
    }

    async fn expire_licenses(&self, now: Timestamp) -> Result<u64, LedgerError> {
        self.guard()?;
        self.inner.expire_licenses(now).await
    }

    async fn create_template(&self, new: NewTemplate) -> Result<Template, LedgerError> {
        self.guard()?;
        self.inner.create_template(new).await
    }

    async fn list_templates(&self) -> Result<Vec<Template>, LedgerError> {
        self.guard()?;
        self.inner.list_templates().await
    }

    async fn update_template(
        &self,
        id: DbId,
        update: UpdateTemplate,
    ) -> Result<Option<Template>, LedgerError> {
        self.guard()?;
        self.inner.update_template(id, update).await
    }

    async fn delete_template(&self, id: DbId) -> Result<bool, LedgerError> {
        self.guard()?;
        self.inner.delete_template(id).await
    }

    async fn record_outcome(&self, outcome: NewOutcome) -> Result<(), LedgerError> {
        self.guard()?;
        self.inner.record_outcome(outcome).await
    }

    async fn recent_outcomes(&self, limit: i64) -> Result<Vec<DispatchOutcome>, LedgerError> {
        self.guard()?;
        self.inner.recent_outcomes(limit).await
    }

    async fn outcome_stats(&self) -> Result<OutcomeStats, LedgerError> {
        self.guard()?;
        self.inner.outcome_stats().await
    }

    async fn settings(&self) -> Result<Vec<Setting>, LedgerError> {
        self.guard()?;
        self.inner.settings().await
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), LedgerError> {
        self.guard()?;
        self.inner.put_setting(key, value).await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn service_over(ledger: Arc<dyn Ledger>) -> LicenseService {
    LicenseService::new(ledger, Arc::new(EventBus::default()))
}

async fn seed_user(ledger: &dyn Ledger, email: &str) -> User {
    ledger
        .create_user(NewUser {
            email: email.into(),
            password_hash: "$argon2id$stub".into(),
            name: "Test".into(),
            phone: None,
        })
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn issue_persists_unused_license_with_terms() {
    let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new());
    let service = service_over(Arc::clone(&ledger));

    let license = service.issue("2 Year Plan", 999, 730).await.unwrap();
    assert_eq!(license.status, "unused");
    assert_eq!(license.plan_name, "2 Year Plan");
    assert_eq!(license.duration_days, 730);
    assert!(beamline_core::license::is_valid_key(&license.key));
    assert!(license.user_id.is_none());
    assert!(license.expires_at.is_none());
}

#[tokio::test]
async fn issue_rejects_bad_terms() {
    let service = service_over(Arc::new(MemoryLedger::new()));
    assert_matches!(
        service.issue("", 999, 730).await,
        Err(LicenseError::Validation(_))
    );
    assert_matches!(
        service.issue("Plan", -1, 730).await,
        Err(LicenseError::Validation(_))
    );
    assert_matches!(
        service.issue("Plan", 999, 0).await,
        Err(LicenseError::Validation(_))
    );
}

#[tokio::test]
async fn full_lifecycle_issue_activate_verify_expire() {
    let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new());
    let service = service_over(Arc::clone(&ledger));
    let user = seed_user(ledger.as_ref(), "ana@example.com").await;

    let license = service.issue("1 Year Plan", 499, 365).await.unwrap();

    let now = Utc::now();
    let activated = service.activate(&license.key, user.id, now).await.unwrap();
    assert_eq!(activated.expires_at, now + Duration::days(365));

    // Verify succeeds with the matching expiry and the owning user.
    let verification = service.verify(&license.key, "machine-1", now).await.unwrap();
    assert_matches!(verification, Verification::Valid { user: u, expires_at } => {
        assert_eq!(u.id, user.id);
        assert_eq!(expires_at, activated.expires_at);
    });

    // Advance the clock past expiry, sweep, and verify again.
    let later = now + Duration::days(366);
    service.sweep_expirations(later).await.unwrap();
    let err = service.verify(&license.key, "machine-1", later).await.unwrap_err();
    assert_matches!(err, LicenseError::Expired);
}

#[tokio::test]
async fn activate_is_one_shot() {
    let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new());
    let service = service_over(Arc::clone(&ledger));
    let user_a = seed_user(ledger.as_ref(), "a@example.com").await;
    let user_b = seed_user(ledger.as_ref(), "b@example.com").await;

    let license = service.issue("Plan", 999, 730).await.unwrap();
    let now = Utc::now();

    service.activate(&license.key, user_a.id, now).await.unwrap();
    let err = service.activate(&license.key, user_b.id, now).await.unwrap_err();
    assert_matches!(err, LicenseError::AlreadyUsed);

    // The first activation's terms are untouched.
    let stored = ledger.find_license_by_key(&license.key).await.unwrap().unwrap();
    assert_eq!(stored.user_id, Some(user_a.id));
}

#[tokio::test]
async fn activate_unknown_key_is_not_found() {
    let service = service_over(Arc::new(MemoryLedger::new()));
    let err = service
        .activate("BL-ZZZZ-ZZZZ-ZZZZ-ZZZZ", 1, Utc::now())
        .await
        .unwrap_err();
    assert_matches!(err, LicenseError::NotFound);
}

#[tokio::test]
async fn verify_unactivated_key_is_rejected() {
    let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new());
    let service = service_over(Arc::clone(&ledger));

    let license = service.issue("Plan", 999, 730).await.unwrap();
    let err = service
        .verify(&license.key, "machine-1", Utc::now())
        .await
        .unwrap_err();
    assert_matches!(err, LicenseError::NotActivated);
}

#[tokio::test]
async fn verify_enforces_machine_binding() {
    let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new());
    let service = service_over(Arc::clone(&ledger));
    let user = seed_user(ledger.as_ref(), "ana@example.com").await;

    let license = service.issue("Plan", 999, 730).await.unwrap();
    let now = Utc::now();
    service.activate(&license.key, user.id, now).await.unwrap();

    // First verify binds machine-1; machine-1 keeps working.
    service.verify(&license.key, "machine-1", now).await.unwrap();
    service.verify(&license.key, "machine-1", now).await.unwrap();

    // A different machine is refused, no re-bind.
    let err = service.verify(&license.key, "machine-2", now).await.unwrap_err();
    assert_matches!(err, LicenseError::MachineMismatch);
    service.verify(&license.key, "machine-1", now).await.unwrap();
}

#[tokio::test]
async fn sweep_twice_is_idempotent() {
    let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new());
    let service = service_over(Arc::clone(&ledger));
    let user = seed_user(ledger.as_ref(), "ana@example.com").await;

    let license = service.issue("Plan", 999, 30).await.unwrap();
    let now = Utc::now();
    service.activate(&license.key, user.id, now).await.unwrap();

    let later = now + Duration::days(31);
    assert_eq!(service.sweep_expirations(later).await.unwrap(), 1);
    assert_eq!(service.sweep_expirations(later).await.unwrap(), 0);
}

#[tokio::test]
async fn offline_grace_covers_recent_verification() {
    let flaky = Arc::new(FlakyLedger::new());
    let ledger: Arc<dyn Ledger> = Arc::clone(&flaky) as Arc<dyn Ledger>;
    let service = service_over(ledger);
    let user = seed_user(flaky.as_ref(), "ana@example.com").await;

    let license = service.issue("Plan", 999, 730).await.unwrap();
    let now = Utc::now();
    service.activate(&license.key, user.id, now).await.unwrap();
    service.verify(&license.key, "machine-1", now).await.unwrap();

    flaky.go_offline();

    // Inside the window: degraded but valid, and distinguishable.
    let soon = now + Duration::days(3);
    let verification = service.verify(&license.key, "machine-1", soon).await.unwrap();
    assert_matches!(verification, Verification::OfflineGrace { user_id, .. } => {
        assert_eq!(user_id, user.id);
    });

    // Wrong machine fails closed even offline.
    let err = service.verify(&license.key, "machine-2", soon).await.unwrap_err();
    assert_matches!(err, LicenseError::MachineMismatch);

    // Past the window: fail closed.
    let much_later = now + Duration::days(8);
    let err = service
        .verify(&license.key, "machine-1", much_later)
        .await
        .unwrap_err();
    assert_matches!(err, LicenseError::StoreUnavailable);
}

#[tokio::test]
async fn offline_without_prior_verification_fails_closed() {
    let flaky = Arc::new(FlakyLedger::new());
    let service = service_over(Arc::clone(&flaky) as Arc<dyn Ledger>);

    flaky.go_offline();
    let err = service
        .verify("BL-AAAA-AAAA-AAAA-AAAA", "machine-1", Utc::now())
        .await
        .unwrap_err();
    assert_matches!(err, LicenseError::StoreUnavailable);
}

#[tokio::test]
async fn summary_reflects_activation() {
    let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new());
    let service = service_over(Arc::clone(&ledger));
    let user = seed_user(ledger.as_ref(), "ana@example.com").await;

    let empty = service.summary(user.id).await.unwrap();
    assert!(empty.key.is_none());

    let license = service.issue("Plan", 999, 730).await.unwrap();
    service.activate(&license.key, user.id, Utc::now()).await.unwrap();

    let summary = service.summary(user.id).await.unwrap();
    assert_eq!(summary.key.as_deref(), Some(license.key.as_str()));
    assert_eq!(summary.status.as_deref(), Some("active"));
    assert!(summary.expires_at.is_some());
}
