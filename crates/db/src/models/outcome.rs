//! Per-recipient dispatch outcome records (the message log).

use beamline_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// One persisted outcome row: exactly one per recipient of every job.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DispatchOutcome {
    pub id: DbId,
    pub recipient: String,
    pub template_id: Option<DbId>,
    pub resolved_message: String,
    /// `"sent"` or `"failed"`.
    pub status: String,
    /// Endpoint error text, captured verbatim, for failed sends.
    pub error: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for recording an outcome.
#[derive(Debug, Clone)]
pub struct NewOutcome {
    pub recipient: String,
    pub template_id: Option<DbId>,
    pub resolved_message: String,
    pub status: String,
    pub error: Option<String>,
}

/// Aggregate counts over the message log.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OutcomeStats {
    pub total: i64,
    pub sent: i64,
    pub failed: i64,
}
