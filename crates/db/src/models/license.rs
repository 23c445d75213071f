//! License entity model and DTOs.

use beamline_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Full license row from the `licenses` table.
///
/// `status` holds the storage form of
/// [`LicenseStatus`](beamline_core::license::LicenseStatus); the licensing
/// service parses it before applying any lifecycle rule.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct License {
    pub id: DbId,
    pub key: String,
    pub user_id: Option<DbId>,
    pub plan_name: String,
    pub price: i32,
    pub duration_days: i32,
    pub status: String,
    pub machine_id: Option<String>,
    pub activated_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    pub last_active_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// DTO for issuing a new license. Terms are immutable after issuance.
#[derive(Debug, Clone)]
pub struct NewLicense {
    pub key: String,
    pub plan_name: String,
    pub price: i32,
    pub duration_days: i32,
}
