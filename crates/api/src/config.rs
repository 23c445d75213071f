use std::time::Duration;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
    /// Postgres URL; when unset or unreachable the in-memory ledger runs.
    pub database_url: Option<String>,
    /// WebSocket URL of the bridge sidecar.
    pub bridge_ws_url: String,
    /// Directory holding persisted link credentials.
    pub credentials_dir: String,
    /// Fixed floor between consecutive sends of a job (default: `30`).
    pub pacing_secs: u64,
    /// Fixed delay before relink attempts after a disconnect (default: `5`).
    pub relink_delay_secs: u64,
    /// Consecutive auth failures before the session parks (default: `5`).
    pub auth_failure_ceiling: u32,
    /// Interval of the background expiry sweep (default: `3600`).
    pub sweep_interval_secs: u64,
    /// Probe recipient reachability before each send (default: `true`).
    pub check_reachability: bool,
    /// Admin account seeded into the in-memory ledger fallback.
    pub admin_email: String,
    pub admin_password: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                     |
    /// |-------------------------|-----------------------------|
    /// | `HOST`                  | `0.0.0.0`                   |
    /// | `PORT`                  | `3000`                      |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`     |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                        |
    /// | `DATABASE_URL`          | unset (memory fallback)     |
    /// | `BRIDGE_WS_URL`         | `ws://127.0.0.1:7071/bridge`|
    /// | `LINK_CREDENTIALS_DIR`  | `./.beamline/link-auth`     |
    /// | `DISPATCH_PACING_SECS`  | `30`                        |
    /// | `RELINK_DELAY_SECS`     | `5`                         |
    /// | `AUTH_FAILURE_CEILING`  | `5`                         |
    /// | `LICENSE_SWEEP_SECS`    | `3600`                      |
    /// | `CHECK_REACHABILITY`    | `true`                      |
    /// | `ADMIN_EMAIL`           | `admin@beamline.dev`        |
    /// | `ADMIN_PASSWORD`        | `admin123`                  |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            jwt: JwtConfig::from_env(),
            database_url: std::env::var("DATABASE_URL").ok(),
            bridge_ws_url: std::env::var("BRIDGE_WS_URL")
                .unwrap_or_else(|_| "ws://127.0.0.1:7071/bridge".into()),
            credentials_dir: std::env::var("LINK_CREDENTIALS_DIR")
                .unwrap_or_else(|_| "./.beamline/link-auth".into()),
            pacing_secs: env_u64("DISPATCH_PACING_SECS", 30),
            relink_delay_secs: env_u64("RELINK_DELAY_SECS", 5),
            auth_failure_ceiling: env_u64("AUTH_FAILURE_CEILING", 5) as u32,
            sweep_interval_secs: env_u64("LICENSE_SWEEP_SECS", 3600),
            check_reachability: std::env::var("CHECK_REACHABILITY")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            admin_email: std::env::var("ADMIN_EMAIL")
                .unwrap_or_else(|_| "admin@beamline.dev".into()),
            admin_password: std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".into()),
        }
    }

    /// Pacing floor as a [`Duration`].
    pub fn pacing(&self) -> Duration {
        Duration::from_secs(self.pacing_secs)
    }

    /// Relink delay as a [`Duration`].
    pub fn relink_delay(&self) -> Duration {
        Duration::from_secs(self.relink_delay_secs)
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
