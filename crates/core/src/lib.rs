//! Shared domain types and rules for the Beamline platform.
//!
//! Everything in this crate is pure: no I/O, no async, no storage. The
//! license rules here are the single source of truth for key format,
//! status transitions, and expiry math; the storage and service layers
//! apply them but never re-derive them.

pub mod error;
pub mod license;
pub mod personalize;
pub mod types;
