//! In-process cache of successful verifications.
//!
//! When the ledger is unreachable, a caller holding a recently-verified
//! license may continue inside a bounded grace window instead of failing
//! closed immediately. This cache is deliberately process-local and
//! best-effort: it only ever loosens an outage, never widens access
//! beyond what a successful online verification already granted.

use std::collections::HashMap;

use beamline_core::types::{DbId, Timestamp};
use tokio::sync::RwLock;

/// What we remember about the last successful verification of a key.
#[derive(Debug, Clone)]
pub struct GraceEntry {
    pub user_id: DbId,
    pub expires_at: Option<Timestamp>,
    pub machine_id: String,
    pub last_verified: Timestamp,
}

/// Keyed by license key.
#[derive(Default)]
pub struct GraceCache {
    entries: RwLock<HashMap<String, GraceEntry>>,
}

impl GraceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or refresh) a successful verification.
    pub async fn record(&self, key: &str, entry: GraceEntry) {
        self.entries.write().await.insert(key.to_string(), entry);
    }

    /// Look up the last successful verification of a key, if any.
    pub async fn lookup(&self, key: &str) -> Option<GraceEntry> {
        self.entries.read().await.get(key).cloned()
    }

    /// Drop a key from the cache (e.g. after an online `Expired`).
    pub async fn forget(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}
