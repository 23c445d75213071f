//! Periodic license expiry sweep.
//!
//! Logins already sweep lazily; this task catches licenses that expire
//! while nobody logs in, so admin dashboards and verify calls see fresh
//! status. Runs on a fixed interval until cancelled. The sweep itself is
//! idempotent, so the cadence is a freshness knob, not a correctness one.

use std::sync::Arc;
use std::time::Duration;

use beamline_licensing::LicenseService;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

/// Run the sweep loop. Returns when `cancel` fires.
pub async fn run(licenses: Arc<LicenseService>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "License sweep started");

    let mut ticker = tokio::time::interval(interval);
    // The first tick of `interval` completes immediately; skip it so the
    // first sweep happens one full period after startup.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("License sweep stopping");
                break;
            }
            _ = ticker.tick() => {
                match licenses.sweep_expirations(Utc::now()).await {
                    Ok(0) => tracing::debug!("License sweep: nothing to expire"),
                    Ok(expired) => tracing::info!(expired, "License sweep: licenses expired"),
                    Err(e) => tracing::error!(error = %e, "License sweep failed"),
                }
            }
        }
    }
}
