use std::sync::Arc;

use beamline_db::ledger::Ledger;
use beamline_dispatch::DispatchEngine;
use beamline_events::EventBus;
use beamline_gateway::manager::SessionManager;
use beamline_licensing::LicenseService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (everything is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Durable store (PostgreSQL or the in-memory fallback).
    pub ledger: Arc<dyn Ledger>,
    /// Fan-out bus for session/license/dispatch events.
    pub bus: Arc<EventBus>,
    /// The single process-wide session coordinator.
    pub session: Arc<SessionManager>,
    /// The license coordinator.
    pub licenses: Arc<LicenseService>,
    /// The dispatch engine.
    pub engine: Arc<DispatchEngine>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
