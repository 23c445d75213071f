//! Route definitions for the `/session` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::session;
use crate::state::AppState;

/// Routes mounted at `/session`.
///
/// ```text
/// GET  /         -> link state (public)
/// POST /link     -> request a device link (requires auth)
/// POST /logout   -> invalidate the remote link (requires auth)
/// POST /reset    -> wipe credentials, force idle (requires auth)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(session::status))
        .route("/link", post(session::link))
        .route("/logout", post(session::logout))
        .route("/reset", post(session::reset))
}
