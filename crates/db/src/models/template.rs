//! Saved message templates.

use beamline_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A reusable message template.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Template {
    pub id: DbId,
    pub name: String,
    pub message: String,
    pub created_at: Timestamp,
}

/// DTO for creating a template.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    pub message: String,
}

/// DTO for updating a template.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTemplate {
    pub name: String,
    pub message: String,
}
