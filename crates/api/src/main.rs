use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use beamline_db::ledger::{Ledger, MemoryLedger, PgLedger};
use beamline_dispatch::{DispatchEngine, EngineConfig, FixedDelayPacer};
use beamline_events::EventBus;
use beamline_gateway::credentials::CredentialStore;
use beamline_gateway::manager::{SessionConfig, SessionManager};
use beamline_gateway::remote::RemoteEndpoint;
use beamline_licensing::LicenseService;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use beamline_api::auth::password::hash_password;
use beamline_api::background;
use beamline_api::config::ServerConfig;
use beamline_api::router::build_app_router;
use beamline_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beamline=debug,beamline_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Durable store (PostgreSQL, or the seeded memory fallback) ---
    let ledger = connect_ledger(&config).await;
    tracing::info!(backend = ledger.backend(), "Ledger ready");

    // --- Event bus ---
    let bus = Arc::new(EventBus::default());

    // --- Gateway: bridge endpoint + session coordinator ---
    let (endpoint, endpoint_events) = RemoteEndpoint::new(config.bridge_ws_url.clone());
    let session = SessionManager::start(
        endpoint.clone() as Arc<dyn beamline_gateway::endpoint::ChatEndpoint>,
        endpoint_events,
        Arc::clone(&bus),
        CredentialStore::new(&config.credentials_dir),
        SessionConfig {
            relink_delay: config.relink_delay(),
            auth_failure_ceiling: config.auth_failure_ceiling,
        },
    );

    // Kick off the device link right away; the UI renders the pairing
    // payload as soon as the bridge issues one.
    if let Err(e) = session.request_link().await {
        tracing::warn!(error = %e, "Initial link request failed; retry via POST /session/link");
    }

    // --- Coordinators ---
    let licenses = Arc::new(LicenseService::new(Arc::clone(&ledger), Arc::clone(&bus)));
    let engine = Arc::new(DispatchEngine::new(
        endpoint as Arc<dyn beamline_gateway::endpoint::ChatEndpoint>,
        Arc::clone(&session),
        Arc::clone(&ledger),
        Arc::clone(&bus),
        Arc::new(FixedDelayPacer::new(config.pacing())),
        EngineConfig {
            check_reachability: config.check_reachability,
        },
    ));

    // --- Background sweep ---
    let sweep_cancel = tokio_util::sync::CancellationToken::new();
    let sweep_handle = tokio::spawn(background::license_sweep::run(
        Arc::clone(&licenses),
        Duration::from_secs(config.sweep_interval_secs),
        sweep_cancel.clone(),
    ));

    // --- App state / router ---
    let state = AppState {
        ledger,
        bus,
        session: Arc::clone(&session),
        licenses,
        engine,
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    sweep_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sweep_handle).await;
    tracing::info!("License sweep stopped");

    session.shutdown().await;
    tracing::info!("Graceful shutdown complete");
}

/// Connect to PostgreSQL, or fall back to the in-memory ledger seeded
/// with the administrative account.
async fn connect_ledger(config: &ServerConfig) -> Arc<dyn Ledger> {
    if let Some(url) = &config.database_url {
        match beamline_db::create_pool(url).await {
            Ok(pool) => match beamline_db::run_migrations(&pool).await {
                Ok(()) => {
                    tracing::info!("Database connected, migrations applied");
                    return Arc::new(PgLedger::new(pool));
                }
                Err(e) => {
                    tracing::error!(error = %e, "Migrations failed; using in-memory store");
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Database unreachable; using in-memory store");
            }
        }
    } else {
        tracing::warn!("DATABASE_URL not set; using in-memory store");
    }

    let password_hash = hash_password(&config.admin_password)
        .expect("Failed to hash the seeded admin password");
    tracing::info!(email = %config.admin_email, "Seeded in-memory admin account");
    Arc::new(MemoryLedger::seeded(&config.admin_email, "Admin", password_hash))
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
