//! Handlers for the `/admin` resource (stats, licenses, users, settings)
//! plus the public payment-settings read used by the activation page.

use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use beamline_db::models::License;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AppResult;
use crate::handlers::auth::UserInfo;
use crate::middleware::auth::RequireAdmin;
use crate::state::AppState;

/// Terms used when an admin generates a license without overrides.
const DEFAULT_PLAN_NAME: &str = "2 Year Plan";
const DEFAULT_PRICE: i32 = 999;
const DEFAULT_DURATION_DAYS: i32 = 730;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Dashboard counters.
#[derive(Debug, Serialize)]
pub struct AdminStats {
    pub total_users: usize,
    pub active_licenses: usize,
    pub unused_licenses: usize,
    pub expired_licenses: usize,
}

/// Optional overrides for `POST /admin/licenses`.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateLicenseRequest {
    pub plan_name: Option<String>,
    pub price: Option<i32>,
    pub duration_days: Option<i32>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/admin/stats
pub async fn stats(
    State(state): State<AppState>,
    RequireAdmin(_user): RequireAdmin,
) -> AppResult<Json<AdminStats>> {
    let users = state.ledger.list_users().await?;
    let licenses = state.ledger.list_licenses().await?;

    let count = |status: &str| licenses.iter().filter(|l| l.status == status).count();
    Ok(Json(AdminStats {
        total_users: users.iter().filter(|u| !u.is_admin).count(),
        active_licenses: count("active"),
        unused_licenses: count("unused"),
        expired_licenses: count("expired"),
    }))
}

/// GET /api/v1/admin/licenses
pub async fn list_licenses(
    State(state): State<AppState>,
    RequireAdmin(_user): RequireAdmin,
) -> AppResult<Json<Vec<License>>> {
    Ok(Json(state.ledger.list_licenses().await?))
}

/// POST /api/v1/admin/licenses
///
/// Issue a new license. Terms default to the standard plan when the body
/// is absent.
pub async fn generate_license(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Json(input): Json<GenerateLicenseRequest>,
) -> AppResult<Json<License>> {
    let license = state
        .licenses
        .issue(
            input.plan_name.as_deref().unwrap_or(DEFAULT_PLAN_NAME),
            input.price.unwrap_or(DEFAULT_PRICE),
            input.duration_days.unwrap_or(DEFAULT_DURATION_DAYS),
        )
        .await?;

    tracing::info!(admin_id = user.user_id, key = %license.key, "License generated");
    Ok(Json(license))
}

/// GET /api/v1/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_user): RequireAdmin,
) -> AppResult<Json<Vec<UserInfo>>> {
    let users = state.ledger.list_users().await?;
    Ok(Json(users.iter().map(UserInfo::from).collect()))
}

/// GET /api/v1/admin/settings
pub async fn get_settings(
    State(state): State<AppState>,
    RequireAdmin(_user): RequireAdmin,
) -> AppResult<Json<serde_json::Value>> {
    let settings = state.ledger.settings().await?;
    let object: serde_json::Map<String, serde_json::Value> = settings
        .into_iter()
        .map(|s| (s.key, serde_json::Value::String(s.value)))
        .collect();
    Ok(Json(serde_json::Value::Object(object)))
}

/// PUT /api/v1/admin/settings
pub async fn update_settings(
    State(state): State<AppState>,
    RequireAdmin(_user): RequireAdmin,
    Json(input): Json<HashMap<String, String>>,
) -> AppResult<Json<serde_json::Value>> {
    for (key, value) in &input {
        state.ledger.put_setting(key, value).await?;
    }
    Ok(Json(json!({ "success": true })))
}

/// GET /api/v1/public/payment-settings
///
/// Unauthenticated read of the subset of settings the activation page
/// needs to render payment instructions.
pub async fn payment_settings(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let settings = state.ledger.settings().await?;
    let get = |key: &str, default: &str| {
        settings
            .iter()
            .find(|s| s.key == key)
            .map(|s| s.value.clone())
            .unwrap_or_else(|| default.to_string())
    };

    Ok(Json(json!({
        "payment_handle": get("payment_handle", "your-payment-handle"),
        "payment_name": get("payment_name", "Your Business Name"),
        "contact_number": get("contact_number", ""),
        "license_price": get("license_price", "999"),
        "license_duration": get("license_duration", "2 Years"),
        "qr_image": get("qr_image", ""),
    })))
}
