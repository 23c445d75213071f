//! Route definitions for the `/templates` resource.

use axum::routing::{get, put};
use axum::Router;

use crate::handlers::templates;
use crate::state::AppState;

/// Routes mounted at `/templates`.
///
/// ```text
/// GET    /      -> list
/// POST   /      -> create
/// PUT    /{id}  -> update
/// DELETE /{id}  -> delete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(templates::list).post(templates::create))
        .route("/{id}", put(templates::update).delete(templates::delete))
}
