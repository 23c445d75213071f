//! Handlers for the `/templates` resource (saved message templates).

use axum::extract::{Path, State};
use axum::Json;
use beamline_core::error::CoreError;
use beamline_core::types::DbId;
use beamline_db::models::{NewTemplate, Template, UpdateTemplate};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// GET /api/v1/templates
pub async fn list(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<Vec<Template>>> {
    Ok(Json(state.ledger.list_templates().await?))
}

/// POST /api/v1/templates
pub async fn create(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(input): Json<NewTemplate>,
) -> AppResult<Json<Template>> {
    if input.name.trim().is_empty() || input.message.trim().is_empty() {
        return Err(AppError::BadRequest("Name and message are required".into()));
    }
    Ok(Json(state.ledger.create_template(input).await?))
}

/// PUT /api/v1/templates/{id}
pub async fn update(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateTemplate>,
) -> AppResult<Json<Template>> {
    if input.name.trim().is_empty() || input.message.trim().is_empty() {
        return Err(AppError::BadRequest("Name and message are required".into()));
    }
    let template = state
        .ledger
        .update_template(id, input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "template",
            id,
        }))?;
    Ok(Json(template))
}

/// DELETE /api/v1/templates/{id}
pub async fn delete(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<serde_json::Value>> {
    let deleted = state.ledger.delete_template(id).await?;
    if !deleted {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "template",
            id,
        }));
    }
    Ok(Json(json!({ "success": true })))
}
