//! Best-effort in-memory [`Ledger`] fallback.
//!
//! Used when PostgreSQL is unreachable at startup so the product stays
//! operable (nothing survives a restart). All state sits behind one
//! `RwLock`; taking the write guard makes the compound operations
//! (`activate_license`, `bind_machine`) atomic with respect to each other
//! without any further coordination.

use std::collections::BTreeMap;

use async_trait::async_trait;
use beamline_core::license::expiry_from;
use beamline_core::types::{DbId, Timestamp};
use chrono::Utc;
use tokio::sync::RwLock;

use crate::models::{
    DispatchOutcome, License, NewLicense, NewOutcome, NewTemplate, NewUser, OutcomeStats, Setting,
    Template, UpdateTemplate, User,
};

use super::{ActivationOutcome, Ledger, LedgerError, MachineBinding};

/// Settings present out of the box, so the activation page renders
/// something sensible before an operator configures anything.
const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("payment_handle", "your-payment-handle"),
    ("payment_name", "Your Business Name"),
    ("contact_number", "15550000000"),
    ("license_price", "999"),
    ("license_duration", "2 Years"),
    ("qr_image", ""),
];

#[derive(Default)]
struct MemoryState {
    users: Vec<User>,
    licenses: Vec<License>,
    templates: Vec<Template>,
    outcomes: Vec<DispatchOutcome>,
    settings: BTreeMap<String, String>,
    next_user_id: DbId,
    next_license_id: DbId,
    next_template_id: DbId,
    next_outcome_id: DbId,
}

/// The fallback ledger.
pub struct MemoryLedger {
    state: RwLock<MemoryState>,
}

impl MemoryLedger {
    /// Empty ledger with default settings and no accounts.
    pub fn new() -> Self {
        let mut state = MemoryState {
            next_user_id: 1,
            next_license_id: 1,
            next_template_id: 1,
            next_outcome_id: 1,
            ..Default::default()
        };
        for (key, value) in DEFAULT_SETTINGS {
            state.settings.insert((*key).into(), (*value).into());
        }
        Self {
            state: RwLock::new(state),
        }
    }

    /// Ledger seeded with one administrative account.
    ///
    /// `password_hash` must already be an argon2 PHC string; hashing is
    /// the caller's concern.
    pub fn seeded(admin_email: &str, admin_name: &str, password_hash: String) -> Self {
        let ledger = Self::new();
        {
            let mut state = ledger
                .state
                .try_write()
                .expect("no other handle can exist during construction");
            let id = state.next_user_id;
            state.next_user_id += 1;
            state.users.push(User {
                id,
                email: admin_email.to_string(),
                password_hash,
                name: admin_name.to_string(),
                phone: None,
                is_admin: true,
                license_key: None,
                license_expires_at: None,
                created_at: Utc::now(),
            });
        }
        ledger
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health(&self) -> Result<(), LedgerError> {
        Ok(())
    }

    // ---- users ----

    async fn create_user(&self, new: NewUser) -> Result<User, LedgerError> {
        let mut state = self.state.write().await;
        if state.users.iter().any(|u| u.email == new.email) {
            return Err(LedgerError::DuplicateEmail);
        }
        let id = state.next_user_id;
        state.next_user_id += 1;
        let user = User {
            id,
            email: new.email,
            password_hash: new.password_hash,
            name: new.name,
            phone: new.phone,
            is_admin: false,
            license_key: None,
            license_expires_at: None,
            created_at: Utc::now(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, LedgerError> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: DbId) -> Result<Option<User>, LedgerError> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, LedgerError> {
        let state = self.state.read().await;
        let mut users = state.users.clone();
        users.reverse();
        Ok(users)
    }

    // ---- licenses ----

    async fn insert_license(&self, new: NewLicense) -> Result<License, LedgerError> {
        let mut state = self.state.write().await;
        if state.licenses.iter().any(|l| l.key == new.key) {
            return Err(LedgerError::DuplicateKey);
        }
        let id = state.next_license_id;
        state.next_license_id += 1;
        let license = License {
            id,
            key: new.key,
            user_id: None,
            plan_name: new.plan_name,
            price: new.price,
            duration_days: new.duration_days,
            status: "unused".into(),
            machine_id: None,
            activated_at: None,
            expires_at: None,
            last_active_at: None,
            created_at: Utc::now(),
        };
        state.licenses.push(license.clone());
        Ok(license)
    }

    async fn find_license_by_key(&self, key: &str) -> Result<Option<License>, LedgerError> {
        let state = self.state.read().await;
        Ok(state.licenses.iter().find(|l| l.key == key).cloned())
    }

    async fn list_licenses(&self) -> Result<Vec<License>, LedgerError> {
        let state = self.state.read().await;
        let mut licenses = state.licenses.clone();
        licenses.reverse();
        Ok(licenses)
    }

    async fn activate_license(
        &self,
        key: &str,
        user_id: DbId,
        now: Timestamp,
    ) -> Result<ActivationOutcome, LedgerError> {
        // One write guard covers the whole check-and-set, including the
        // user-row mirror: the two racing activations serialize here.
        let mut state = self.state.write().await;

        let Some(license) = state.licenses.iter_mut().find(|l| l.key == key) else {
            return Ok(ActivationOutcome::NotFound);
        };
        if license.status != "unused" {
            return Ok(ActivationOutcome::AlreadyUsed);
        }

        let expires_at = expiry_from(now, license.duration_days);
        license.user_id = Some(user_id);
        license.activated_at = Some(now);
        license.expires_at = Some(expires_at);
        license.status = "active".into();
        let activated = license.clone();

        if let Some(user) = state.users.iter_mut().find(|u| u.id == user_id) {
            user.license_key = Some(key.to_string());
            user.license_expires_at = Some(expires_at);
        }

        Ok(ActivationOutcome::Activated(activated))
    }

    async fn bind_machine(
        &self,
        key: &str,
        machine_id: &str,
        now: Timestamp,
    ) -> Result<MachineBinding, LedgerError> {
        let mut state = self.state.write().await;
        let Some(license) = state.licenses.iter_mut().find(|l| l.key == key) else {
            return Ok(MachineBinding::NotFound);
        };
        match &license.machine_id {
            Some(bound) if bound != machine_id => Ok(MachineBinding::Mismatch),
            _ => {
                license.machine_id = Some(machine_id.to_string());
                license.last_active_at = Some(now);
                Ok(MachineBinding::Bound(license.clone()))
            }
        }
    }

    async fn expire_licenses(&self, now: Timestamp) -> Result<u64, LedgerError> {
        let mut state = self.state.write().await;
        let mut changed = 0;
        for license in &mut state.licenses {
            if license.status == "active"
                && license.expires_at.is_some_and(|expires| expires < now)
            {
                license.status = "expired".into();
                changed += 1;
            }
        }
        Ok(changed)
    }

    // ---- templates ----

    async fn create_template(&self, new: NewTemplate) -> Result<Template, LedgerError> {
        let mut state = self.state.write().await;
        let id = state.next_template_id;
        state.next_template_id += 1;
        let template = Template {
            id,
            name: new.name,
            message: new.message,
            created_at: Utc::now(),
        };
        state.templates.push(template.clone());
        Ok(template)
    }

    async fn list_templates(&self) -> Result<Vec<Template>, LedgerError> {
        let state = self.state.read().await;
        let mut templates = state.templates.clone();
        templates.reverse();
        Ok(templates)
    }

    async fn update_template(
        &self,
        id: DbId,
        update: UpdateTemplate,
    ) -> Result<Option<Template>, LedgerError> {
        let mut state = self.state.write().await;
        let Some(template) = state.templates.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        template.name = update.name;
        template.message = update.message;
        Ok(Some(template.clone()))
    }

    async fn delete_template(&self, id: DbId) -> Result<bool, LedgerError> {
        let mut state = self.state.write().await;
        let before = state.templates.len();
        state.templates.retain(|t| t.id != id);
        Ok(state.templates.len() < before)
    }

    // ---- dispatch outcomes ----

    async fn record_outcome(&self, outcome: NewOutcome) -> Result<(), LedgerError> {
        let mut state = self.state.write().await;
        let id = state.next_outcome_id;
        state.next_outcome_id += 1;
        state.outcomes.push(DispatchOutcome {
            id,
            recipient: outcome.recipient,
            template_id: outcome.template_id,
            resolved_message: outcome.resolved_message,
            status: outcome.status,
            error: outcome.error,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn recent_outcomes(&self, limit: i64) -> Result<Vec<DispatchOutcome>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .outcomes
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn outcome_stats(&self) -> Result<OutcomeStats, LedgerError> {
        let state = self.state.read().await;
        let mut stats = OutcomeStats::default();
        for outcome in &state.outcomes {
            match outcome.status.as_str() {
                "sent" => stats.sent += 1,
                "failed" => stats.failed += 1,
                _ => {}
            }
            stats.total += 1;
        }
        Ok(stats)
    }

    // ---- settings ----

    async fn settings(&self) -> Result<Vec<Setting>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .settings
            .iter()
            .map(|(key, value)| Setting {
                key: key.clone(),
                value: value.clone(),
            })
            .collect())
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), LedgerError> {
        let mut state = self.state.write().await;
        state.settings.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
