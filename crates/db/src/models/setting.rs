//! Operator settings (key/value).

use serde::Serialize;
use sqlx::FromRow;

/// One settings row.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Setting {
    pub key: String,
    pub value: String,
}
