//! Handlers for the `/auth` resource (signup, login, profile).

use axum::extract::State;
use axum::Json;
use beamline_core::error::CoreError;
use beamline_core::types::{DbId, Timestamp};
use beamline_db::models::{NewUser, User};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::jwt::generate_token;
use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/signup`.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful authentication response.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserInfo,
}

/// Public user info (no password hash).
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: DbId,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub license_key: Option<String>,
    pub license_expires_at: Option<Timestamp>,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
            license_key: user.license_key.clone(),
            license_expires_at: user.license_expires_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/signup
///
/// Register a new account and return a token right away.
pub async fn signup(
    State(state): State<AppState>,
    Json(input): Json<SignupRequest>,
) -> AppResult<Json<AuthResponse>> {
    if input.name.trim().is_empty() || input.email.trim().is_empty() {
        return Err(AppError::BadRequest("Name and email are required".into()));
    }
    if !input.email.contains('@') {
        return Err(AppError::BadRequest("Email address is not valid".into()));
    }
    validate_password_strength(&input.password).map_err(AppError::BadRequest)?;

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = state
        .ledger
        .create_user(NewUser {
            email: input.email.trim().to_string(),
            password_hash,
            name: input.name.trim().to_string(),
            phone: input.phone,
        })
        .await?;

    let token = generate_token(user.id, &user.email, user.is_admin, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    tracing::info!(user_id = user.id, "User registered");
    Ok(Json(AuthResponse {
        token,
        user: UserInfo::from(&user),
    }))
}

/// POST /api/v1/auth/login
///
/// Authenticate with email + password. Sweeps expired licenses as a side
/// effect so the returned license state is current.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = state
        .ledger
        .find_user_by_email(input.email.trim())
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized("Invalid email or password".into()))
        })?;

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !password_valid {
        return Err(AppError::Core(CoreError::Unauthorized(
            "Invalid email or password".into(),
        )));
    }

    // Lazy expiry: every login doubles as a sweep point. A store hiccup
    // here must not block the login itself.
    if let Err(e) = state.licenses.sweep_expirations(Utc::now()).await {
        tracing::error!(error = %e, "Expiry sweep on login failed");
    }

    let token = generate_token(user.id, &user.email, user.is_admin, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    Ok(Json(AuthResponse {
        token,
        user: UserInfo::from(&user),
    }))
}

/// GET /api/v1/auth/profile
pub async fn profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<UserInfo>> {
    let user = state
        .ledger
        .find_user_by_id(user.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "user",
            id: user.user_id,
        }))?;

    Ok(Json(UserInfo::from(&user)))
}
