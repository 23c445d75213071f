//! The License Coordinator.
//!
//! Gates feature access through license keys: issuance, one-shot
//! activation, machine-bound verification with an offline-grace fallback,
//! and the lazy expiry sweep.

pub mod grace;
pub mod service;

pub use service::{
    ActivatedLicense, LicenseError, LicenseService, LicenseSummary, Verification,
};
