//! Handlers for the `/session` resource: link-state reads and the
//! explicit link / logout / reset controls.

use axum::extract::State;
use axum::Json;
use beamline_core::types::Timestamp;
use beamline_gateway::session::SessionState;
use serde::Serialize;
use serde_json::json;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Current session view.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub state: SessionState,
    /// Pairing payload to render, when awaiting a scan.
    pub link_token: Option<String>,
    pub since: Timestamp,
    /// Whether a dispatch job is running against this session.
    pub dispatching: bool,
}

/// GET /api/v1/session
///
/// Public read: the UI shows connection state before login.
pub async fn status(State(state): State<AppState>) -> AppResult<Json<SessionResponse>> {
    let snapshot = state.session.state().await;
    Ok(Json(SessionResponse {
        state: snapshot.state,
        link_token: snapshot.link_token,
        since: snapshot.since,
        dispatching: state.engine.is_running(),
    }))
}

/// POST /api/v1/session/link
///
/// Ask the endpoint for a device link. No-op when already linked.
pub async fn link(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<serde_json::Value>> {
    state.session.request_link().await?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/v1/session/logout
///
/// Invalidate the remote link; the coordinator re-links automatically.
pub async fn logout(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<serde_json::Value>> {
    state.session.logout().await?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/v1/session/reset
///
/// Wipe link credentials and force idle. The way out of `auth-failed`.
pub async fn reset(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<serde_json::Value>> {
    state.session.reset().await;
    Ok(Json(json!({ "success": true })))
}
