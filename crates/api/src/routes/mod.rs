//! Route tree assembly.

pub mod admin;
pub mod auth;
pub mod dispatch;
pub mod health;
pub mod license;
pub mod session;
pub mod templates;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ws                          WebSocket (session/dispatch events)
///
/// /auth/signup                 register (public)
/// /auth/login                  login (public)
/// /auth/profile                current user
///
/// /license/activate            activate a key for the caller
/// /license/verify              machine-bound verify (public)
/// /license/summary             caller's license state
///
/// /admin/stats                 dashboard counters (admin)
/// /admin/licenses              list, generate (admin)
/// /admin/users                 list (admin)
/// /admin/settings              get, update (admin)
///
/// /session                     link state (public read)
/// /session/link                request a device link
/// /session/logout              invalidate the remote link
/// /session/reset               wipe credentials, force idle
///
/// /dispatch                    submit a bulk-send job
/// /dispatch/logs               recent outcomes
/// /dispatch/stats              sent/failed totals
///
/// /templates                   list, create
/// /templates/{id}              update, delete
///
/// /public/payment-settings     activation-page settings (public)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::handler::ws_upgrade))
        .nest("/auth", auth::router())
        .nest("/license", license::router())
        .nest("/admin", admin::router())
        .nest("/session", session::router())
        .nest("/dispatch", dispatch::router())
        .nest("/templates", templates::router())
        .route(
            "/public/payment-settings",
            get(handlers::admin::payment_settings),
        )
}
