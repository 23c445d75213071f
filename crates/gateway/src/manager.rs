//! The Session Coordinator.
//!
//! [`SessionManager`] owns the single process-wide device-link session.
//! It consumes [`EndpointEvent`]s from the gateway, drives the pure state
//! machine in [`crate::session`], publishes one `session-state` event on
//! the bus per transition, and re-links after disconnects on a fixed
//! delay, indefinitely, until shut down or parked in `AuthFailed`.
//!
//! Constructed once at startup via [`SessionManager::start`] and injected
//! wherever session state is needed; there is no hidden global.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use beamline_events::{EventBus, PlatformEvent};
use chrono::Utc;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::credentials::CredentialStore;
use crate::endpoint::{ChatEndpoint, EndpointError, EndpointEvent};
use crate::session::{transition, SessionSnapshot, SessionState};

/// Tunables for the coordinator.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Fixed delay before each relink attempt after a disconnect.
    pub relink_delay: Duration,
    /// Consecutive auth failures tolerated before parking in `AuthFailed`.
    pub auth_failure_ceiling: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            relink_delay: Duration::from_secs(5),
            auth_failure_ceiling: 5,
        }
    }
}

/// Session-level failures surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session is parked in `AuthFailed`; only `reset` leaves it.
    #[error("Session is in auth-failed state; reset required")]
    AuthFailed,

    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

struct SessionInner {
    state: SessionState,
    link_token: Option<String>,
    since: beamline_core::types::Timestamp,
    auth_failures: u32,
}

/// The single process-wide session coordinator.
pub struct SessionManager {
    inner: RwLock<SessionInner>,
    endpoint: Arc<dyn ChatEndpoint>,
    bus: Arc<EventBus>,
    credentials: CredentialStore,
    config: SessionConfig,
    cancel: CancellationToken,
    /// Guards the relink task: at most one may be pending at a time.
    relink_pending: AtomicBool,
}

impl SessionManager {
    /// Create the coordinator and spawn its event pump.
    ///
    /// `events` is the stream handed out by the concrete endpoint; the
    /// pump runs until the endpoint drops its sender or [`shutdown`]
    /// (Self::shutdown) is called.
    pub fn start(
        endpoint: Arc<dyn ChatEndpoint>,
        events: mpsc::Receiver<EndpointEvent>,
        bus: Arc<EventBus>,
        credentials: CredentialStore,
        config: SessionConfig,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            inner: RwLock::new(SessionInner {
                state: SessionState::Idle,
                link_token: None,
                since: Utc::now(),
                auth_failures: 0,
            }),
            endpoint,
            bus,
            credentials,
            config,
            cancel: CancellationToken::new(),
            relink_pending: AtomicBool::new(false),
        });

        tokio::spawn(Self::pump(Arc::clone(&manager), events));
        manager
    }

    /// Pure read of the current session.
    pub async fn state(&self) -> SessionSnapshot {
        let inner = self.inner.read().await;
        SessionSnapshot {
            state: inner.state,
            link_token: inner.link_token.clone(),
            since: inner.since,
        }
    }

    /// Ask the endpoint to establish the device link.
    ///
    /// Idempotent: a no-op when a link is already pending or live. Fails
    /// when the session is parked in `AuthFailed`.
    pub async fn request_link(&self) -> Result<(), SessionError> {
        let state = self.inner.read().await.state;
        if state == SessionState::AuthFailed {
            return Err(SessionError::AuthFailed);
        }
        if state.link_in_progress() {
            tracing::debug!(state = state.as_str(), "Link already in progress");
            return Ok(());
        }
        self.endpoint.connect().await?;
        Ok(())
    }

    /// Invalidate the remote link and fall back to `Idle`; a relink is
    /// scheduled so the endpoint issues a fresh pairing payload.
    pub async fn logout(self: &Arc<Self>) -> Result<(), SessionError> {
        self.endpoint.disconnect().await?;
        if let Err(e) = self.credentials.clear().await {
            tracing::error!(error = %e, "Failed to clear link credentials on logout");
        }
        self.force_idle(true).await;
        Ok(())
    }

    /// Clear persisted link credentials and force `Idle`.
    ///
    /// The only way out of `AuthFailed`. Does not auto-relink; the caller
    /// decides when to `request_link` again.
    pub async fn reset(&self) {
        if let Err(e) = self.endpoint.disconnect().await {
            tracing::debug!(error = %e, "Endpoint disconnect during reset");
        }
        if let Err(e) = self.credentials.clear().await {
            tracing::error!(error = %e, "Failed to clear link credentials on reset");
        }
        let mut inner = self.inner.write().await;
        inner.state = SessionState::Idle;
        inner.link_token = None;
        inner.since = Utc::now();
        inner.auth_failures = 0;
        drop(inner);
        tracing::info!("Session reset to idle");
        self.bus.publish(PlatformEvent::session_state("idle", None));
    }

    /// Stop the pump and any pending relink.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Err(e) = self.endpoint.disconnect().await {
            tracing::debug!(error = %e, "Endpoint disconnect during shutdown");
        }
        tracing::info!("Session coordinator shut down");
    }

    // ---- internals ----

    /// Consume endpoint events until the channel closes or we shut down.
    async fn pump(self: Arc<Self>, mut events: mpsc::Receiver<EndpointEvent>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        tracing::warn!("Endpoint event stream closed");
                        break;
                    }
                },
            }
        }
    }

    async fn handle_event(self: &Arc<Self>, event: EndpointEvent) {
        if let EndpointEvent::AuthFailure { reason } = &event {
            self.handle_auth_failure(reason).await;
            return;
        }

        let mut inner = self.inner.write().await;
        let Some(next) = transition(inner.state, &event) else {
            tracing::trace!(
                state = inner.state.as_str(),
                ?event,
                "Ignoring endpoint event in current state",
            );
            return;
        };

        inner.state = next;
        inner.since = Utc::now();
        inner.link_token = match &event {
            EndpointEvent::LinkRequestIssued { token } => Some(token.clone()),
            _ => None,
        };
        if next == SessionState::Ready {
            inner.auth_failures = 0;
        }
        let token = inner.link_token.clone();
        drop(inner);

        tracing::info!(state = next.as_str(), "Session state changed");
        self.bus
            .publish(PlatformEvent::session_state(next.as_str(), token.as_deref()));

        if next == SessionState::Disconnected {
            self.schedule_relink();
        }
    }

    async fn handle_auth_failure(self: &Arc<Self>, reason: &str) {
        let mut inner = self.inner.write().await;
        inner.auth_failures += 1;
        let failures = inner.auth_failures;

        if failures >= self.config.auth_failure_ceiling {
            inner.state = SessionState::AuthFailed;
            inner.link_token = None;
            inner.since = Utc::now();
            drop(inner);

            tracing::error!(
                failures,
                reason,
                "Auth failure ceiling reached; session parked until reset",
            );
            self.bus
                .publish(PlatformEvent::session_state("auth-failed", None));
            return;
        }
        drop(inner);

        tracing::warn!(failures, reason, "Auth failure; clearing credentials and retrying");
        if let Err(e) = self.credentials.clear().await {
            tracing::error!(error = %e, "Failed to clear link credentials after auth failure");
        }
        self.force_idle(true).await;
    }

    /// Set `Idle`, publish, and optionally schedule a relink.
    async fn force_idle(self: &Arc<Self>, relink: bool) {
        let mut inner = self.inner.write().await;
        inner.state = SessionState::Idle;
        inner.link_token = None;
        inner.since = Utc::now();
        drop(inner);

        self.bus.publish(PlatformEvent::session_state("idle", None));
        if relink {
            self.schedule_relink();
        }
    }

    /// Spawn the relink task unless one is already pending.
    ///
    /// The task waits the fixed delay, then retries `connect` on the same
    /// cadence until it succeeds, the state moves on without us, or the
    /// coordinator shuts down.
    fn schedule_relink(self: &Arc<Self>) {
        if self.relink_pending.swap(true, Ordering::SeqCst) {
            tracing::debug!("Relink already pending");
            return;
        }

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = manager.cancel.cancelled() => break,
                    _ = tokio::time::sleep(manager.config.relink_delay) => {}
                }

                let state = manager.inner.read().await.state;
                if !matches!(state, SessionState::Disconnected | SessionState::Idle) {
                    break;
                }

                match manager.endpoint.connect().await {
                    Ok(()) => {
                        tracing::info!("Relink attempt issued");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Relink attempt failed; retrying");
                    }
                }
            }
            manager.relink_pending.store(false, Ordering::SeqCst);
        });
    }
}
