//! Route definitions for the `/dispatch` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::dispatch;
use crate::state::AppState;

/// Routes mounted at `/dispatch`.
///
/// ```text
/// POST /        -> submit a bulk-send job (requires auth + license)
/// GET  /logs    -> recent outcome records (requires auth)
/// GET  /stats   -> sent/failed totals (requires auth)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(dispatch::submit))
        .route("/logs", get(dispatch::logs))
        .route("/stats", get(dispatch::stats))
}
