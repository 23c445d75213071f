use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Which ledger backend is live (`postgres` / `memory`).
    pub ledger_backend: &'static str,
    /// Whether the ledger answers a probe.
    pub ledger_healthy: bool,
    /// Current device-link state.
    pub session_state: &'static str,
}

/// GET /health -- service, ledger, and session health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ledger_healthy = state.ledger.health().await.is_ok();
    let session_state = state.session.state().await.state.as_str();

    Json(HealthResponse {
        status: if ledger_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        ledger_backend: state.ledger.backend(),
        ledger_healthy,
        session_state,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
