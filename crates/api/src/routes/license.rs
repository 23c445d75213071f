//! Route definitions for the `/license` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::license;
use crate::state::AppState;

/// Routes mounted at `/license`.
///
/// ```text
/// POST /activate  -> activate (requires auth)
/// POST /verify    -> verify (public; machine-bound desktop check-in)
/// GET  /summary   -> summary (requires auth)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/activate", post(license::activate))
        .route("/verify", post(license::verify))
        .route("/summary", get(license::summary))
}
