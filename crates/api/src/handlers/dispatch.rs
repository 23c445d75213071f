//! Handlers for the `/dispatch` resource: submit a bulk-send job, read
//! the message log and its stats.
//!
//! Submission is license-gated: the license coordinator sits between the
//! API and the engine, exactly once per job.

use axum::extract::State;
use axum::Json;
use beamline_core::error::CoreError;
use beamline_core::types::DbId;
use beamline_db::models::{DispatchOutcome, OutcomeStats};
use beamline_dispatch::{DispatchJob, Recipient};
use beamline_gateway::endpoint::Attachment;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Rows returned by the log endpoint.
const LOG_LIMIT: i64 = 100;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// One contact, already normalized by the import layer.
#[derive(Debug, Deserialize)]
pub struct ContactInput {
    pub address: String,
    pub display_name: Option<String>,
}

/// Transient media reference from a prior upload.
#[derive(Debug, Deserialize)]
pub struct AttachmentInput {
    pub path: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

/// Request body for `POST /dispatch`.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub contacts: Vec<ContactInput>,
    pub message: String,
    pub template_id: Option<DbId>,
    pub attachment: Option<AttachmentInput>,
}

/// Acknowledgement that the job started.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/dispatch
///
/// Accepts the job and returns immediately; progress flows over the
/// WebSocket and into the message log.
pub async fn submit(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<SubmitRequest>,
) -> AppResult<Json<SubmitResponse>> {
    require_active_license(&state, &user).await?;

    let job = DispatchJob {
        recipients: input
            .contacts
            .into_iter()
            .map(|c| Recipient {
                address: c.address,
                display_name: c.display_name,
            })
            .collect(),
        message_template: input.message,
        template_id: input.template_id,
        attachment: input.attachment.map(|a| Attachment {
            path: a.path.into(),
            file_name: a.file_name,
            mime_type: a.mime_type,
        }),
    };

    let accepted = state.engine.submit(job).await?;
    tracing::info!(user_id = user.user_id, total = accepted.total, "Dispatch submitted");
    Ok(Json(SubmitResponse {
        success: true,
        total: accepted.total,
    }))
}

/// GET /api/v1/dispatch/logs
pub async fn logs(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<Vec<DispatchOutcome>>> {
    Ok(Json(state.ledger.recent_outcomes(LOG_LIMIT).await?))
}

/// GET /api/v1/dispatch/stats
pub async fn stats(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<OutcomeStats>> {
    Ok(Json(state.ledger.outcome_stats().await?))
}

// ---------------------------------------------------------------------------
// License gate
// ---------------------------------------------------------------------------

/// Admins pass; everyone else needs an unexpired active license.
async fn require_active_license(state: &AppState, user: &AuthUser) -> AppResult<()> {
    if user.is_admin {
        return Ok(());
    }

    let summary = state.licenses.summary(user.user_id).await?;
    let active = summary.status.as_deref() == Some("active")
        && summary.expires_at.is_some_and(|expires| expires > Utc::now());
    if active {
        Ok(())
    } else {
        Err(AppError::Core(CoreError::Forbidden(
            "An active license is required to send messages".into(),
        )))
    }
}
