use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use beamline_core::error::CoreError;
use beamline_db::ledger::LedgerError;
use beamline_dispatch::DispatchError;
use beamline_gateway::manager::SessionError;
use beamline_licensing::LicenseError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain error enums and implements [`IntoResponse`] to
/// produce consistent `{error, code}` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A generic domain error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A license-domain error.
    #[error(transparent)]
    License(#[from] LicenseError),

    /// A dispatch-domain error.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A session-domain error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A storage error from the ledger.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => internal(msg),
            },

            AppError::License(license) => match license {
                LicenseError::NotFound => (
                    StatusCode::NOT_FOUND,
                    "LICENSE_NOT_FOUND",
                    license.to_string(),
                ),
                LicenseError::AlreadyUsed => {
                    (StatusCode::CONFLICT, "LICENSE_ALREADY_USED", license.to_string())
                }
                LicenseError::NotActivated => (
                    StatusCode::BAD_REQUEST,
                    "LICENSE_NOT_ACTIVATED",
                    license.to_string(),
                ),
                LicenseError::Expired => {
                    (StatusCode::FORBIDDEN, "LICENSE_EXPIRED", license.to_string())
                }
                LicenseError::MachineMismatch => (
                    StatusCode::FORBIDDEN,
                    "LICENSE_MACHINE_MISMATCH",
                    license.to_string(),
                ),
                LicenseError::StoreUnavailable => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "LICENSE_STORE_UNAVAILABLE",
                    license.to_string(),
                ),
                LicenseError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                LicenseError::Ledger(e) => classify_ledger(e),
                LicenseError::Internal(msg) => internal(msg),
            },

            AppError::Dispatch(dispatch) => match dispatch {
                DispatchError::SessionNotReady => (
                    StatusCode::CONFLICT,
                    "SESSION_NOT_READY",
                    dispatch.to_string(),
                ),
                DispatchError::JobAlreadyRunning => (
                    StatusCode::CONFLICT,
                    "JOB_ALREADY_RUNNING",
                    dispatch.to_string(),
                ),
                DispatchError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
            },

            AppError::Session(session) => match session {
                SessionError::AuthFailed => {
                    (StatusCode::CONFLICT, "SESSION_AUTH_FAILED", session.to_string())
                }
                SessionError::Endpoint(e) => (
                    StatusCode::BAD_GATEWAY,
                    "ENDPOINT_ERROR",
                    e.to_string(),
                ),
            },

            AppError::Ledger(e) => classify_ledger(e),

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map ledger failures onto HTTP.
fn classify_ledger(err: &LedgerError) -> (StatusCode, &'static str, String) {
    match err {
        LedgerError::DuplicateEmail => (StatusCode::CONFLICT, "CONFLICT", err.to_string()),
        LedgerError::DuplicateKey => (StatusCode::CONFLICT, "CONFLICT", err.to_string()),
        LedgerError::Unavailable(msg) => {
            tracing::error!(error = %msg, "Ledger unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_UNAVAILABLE",
                "The record store is unreachable".to_string(),
            )
        }
        LedgerError::Database(e) => {
            tracing::error!(error = %e, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

fn internal(msg: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %msg, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
