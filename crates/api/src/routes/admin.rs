//! Route definitions for the `/admin` resource (admin only).

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// ```text
/// GET  /stats     -> dashboard counters
/// GET  /licenses  -> list all licenses
/// POST /licenses  -> generate a license
/// GET  /users     -> list all users
/// GET  /settings  -> all settings
/// PUT  /settings  -> bulk update settings
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(admin::stats))
        .route("/licenses", get(admin::list_licenses).post(admin::generate_license))
        .route("/users", get(admin::list_users))
        .route("/settings", get(admin::get_settings).put(admin::update_settings))
}
