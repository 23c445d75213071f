//! Handlers for the `/license` resource (activate, verify, summary).

use axum::extract::State;
use axum::Json;
use beamline_core::types::Timestamp;
use beamline_licensing::{LicenseSummary, Verification};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::auth::UserInfo;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /license/activate`.
#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub license_key: String,
}

/// Response for a successful activation.
#[derive(Debug, Serialize)]
pub struct ActivateResponse {
    pub success: bool,
    pub license_key: String,
    pub expires_at: Timestamp,
}

/// Request body for `POST /license/verify` (the desktop check-in).
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub license_key: String,
    pub machine_id: String,
}

/// Response for a successful verification.
///
/// `offline` distinguishes the degraded grace-window path so the client
/// can surface it.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub offline: bool,
    pub expires_at: Option<Timestamp>,
    pub user: Option<UserInfo>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/license/activate
pub async fn activate(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<ActivateRequest>,
) -> AppResult<Json<ActivateResponse>> {
    let key = input.license_key.trim();
    if key.is_empty() {
        return Err(AppError::BadRequest("License key is required".into()));
    }

    let activated = state.licenses.activate(key, user.user_id, Utc::now()).await?;
    Ok(Json(ActivateResponse {
        success: true,
        license_key: activated.key,
        expires_at: activated.expires_at,
    }))
}

/// POST /api/v1/license/verify
///
/// Machine-bound verification used by desktop installs. Unauthenticated:
/// the license key itself is the credential here.
pub async fn verify(
    State(state): State<AppState>,
    Json(input): Json<VerifyRequest>,
) -> AppResult<Json<VerifyResponse>> {
    let verification = state
        .licenses
        .verify(input.license_key.trim(), input.machine_id.trim(), Utc::now())
        .await?;

    let response = match verification {
        Verification::Valid { user, expires_at } => VerifyResponse {
            valid: true,
            offline: false,
            expires_at: Some(expires_at),
            user: Some(UserInfo::from(&user)),
        },
        Verification::OfflineGrace { expires_at, .. } => VerifyResponse {
            valid: true,
            offline: true,
            expires_at,
            user: None,
        },
    };
    Ok(Json(response))
}

/// GET /api/v1/license/summary
pub async fn summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<LicenseSummary>> {
    Ok(Json(state.licenses.summary(user.user_id).await?))
}
