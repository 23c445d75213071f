//! Integration tests for the session coordinator.
//!
//! A scripted endpoint stands in for the bridge: tests push
//! [`EndpointEvent`]s through the channel the coordinator consumes and
//! observe transitions on the event bus.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use beamline_events::{EventBus, PlatformEvent, Topic};
use beamline_gateway::credentials::CredentialStore;
use beamline_gateway::endpoint::{Attachment, ChatEndpoint, EndpointError, EndpointEvent};
use beamline_gateway::manager::{SessionConfig, SessionError, SessionManager};
use beamline_gateway::session::SessionState;
use tokio::sync::{broadcast, mpsc};

// ---------------------------------------------------------------------------
// Scripted endpoint
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MockEndpoint {
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
}

#[async_trait]
impl ChatEndpoint for MockEndpoint {
    async fn connect(&self) -> Result<(), EndpointError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), EndpointError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send(
        &self,
        _address: &str,
        _message: &str,
        _attachment: Option<&Attachment>,
    ) -> Result<(), EndpointError> {
        Ok(())
    }

    async fn is_reachable(&self, _address: &str) -> Result<bool, EndpointError> {
        Ok(true)
    }
}

struct Harness {
    manager: Arc<SessionManager>,
    endpoint: Arc<MockEndpoint>,
    events_tx: mpsc::Sender<EndpointEvent>,
    bus_rx: broadcast::Receiver<PlatformEvent>,
}

fn start(config: SessionConfig) -> Harness {
    let endpoint = Arc::new(MockEndpoint::default());
    let bus = Arc::new(EventBus::default());
    let bus_rx = bus.subscribe();
    let (events_tx, events_rx) = mpsc::channel(16);
    let credentials = CredentialStore::new(
        std::env::temp_dir().join(format!("beamline-session-test-{}", uuid::Uuid::new_v4())),
    );

    let manager = SessionManager::start(
        Arc::clone(&endpoint) as Arc<dyn ChatEndpoint>,
        events_rx,
        bus,
        credentials,
        config,
    );

    Harness {
        manager,
        endpoint,
        events_tx,
        bus_rx,
    }
}

/// Wait for the next `session-state` event and return its state string.
async fn next_state(rx: &mut broadcast::Receiver<PlatformEvent>) -> String {
    let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("bus closed");
    assert_eq!(event.topic, Topic::SessionState);
    event.payload["state"].as_str().expect("state field").to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn link_flow_reaches_ready_and_clears_token() {
    let mut h = start(SessionConfig::default());

    h.events_tx
        .send(EndpointEvent::LinkRequestIssued { token: "scan-me".into() })
        .await
        .unwrap();
    assert_eq!(next_state(&mut h.bus_rx).await, "awaiting-scan");

    let snapshot = h.manager.state().await;
    assert_eq!(snapshot.state, SessionState::AwaitingScan);
    assert_eq!(snapshot.link_token.as_deref(), Some("scan-me"));

    h.events_tx.send(EndpointEvent::Ready).await.unwrap();
    assert_eq!(next_state(&mut h.bus_rx).await, "ready");

    // Ready clears the pairing payload.
    let snapshot = h.manager.state().await;
    assert_eq!(snapshot.state, SessionState::Ready);
    assert_eq!(snapshot.link_token, None);
}

#[tokio::test]
async fn disconnect_schedules_exactly_one_relink() {
    let mut h = start(SessionConfig {
        relink_delay: Duration::from_millis(20),
        ..Default::default()
    });

    h.events_tx.send(EndpointEvent::Ready).await.unwrap();
    assert_eq!(next_state(&mut h.bus_rx).await, "ready");

    // Two disconnect events in a row; the second is a no-op transition.
    h.events_tx
        .send(EndpointEvent::Disconnected { reason: "gone".into() })
        .await
        .unwrap();
    h.events_tx
        .send(EndpointEvent::Disconnected { reason: "gone again".into() })
        .await
        .unwrap();
    assert_eq!(next_state(&mut h.bus_rx).await, "disconnected");

    // Give the relink task time to fire (and to double-fire, if buggy).
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(h.endpoint.connect_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn request_link_is_idempotent_when_linked() {
    let mut h = start(SessionConfig::default());

    h.events_tx.send(EndpointEvent::Ready).await.unwrap();
    assert_eq!(next_state(&mut h.bus_rx).await, "ready");

    h.manager.request_link().await.unwrap();
    assert_eq!(h.endpoint.connect_calls.load(Ordering::SeqCst), 0);

    // From idle it actually connects.
    h.manager.reset().await;
    assert_eq!(next_state(&mut h.bus_rx).await, "idle");
    h.manager.request_link().await.unwrap();
    assert_eq!(h.endpoint.connect_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn auth_failures_park_at_ceiling_and_reset_recovers() {
    let mut h = start(SessionConfig {
        // Long relink delay so background relinks stay out of the counts.
        relink_delay: Duration::from_secs(60),
        auth_failure_ceiling: 2,
    });

    h.events_tx
        .send(EndpointEvent::AuthFailure { reason: "bad credentials".into() })
        .await
        .unwrap();
    // Below the ceiling: credentials wiped, back to idle for a fresh link.
    assert_eq!(next_state(&mut h.bus_rx).await, "idle");

    h.events_tx
        .send(EndpointEvent::AuthFailure { reason: "bad credentials".into() })
        .await
        .unwrap();
    assert_eq!(next_state(&mut h.bus_rx).await, "auth-failed");

    // Terminal: link events are ignored, request_link refuses.
    h.events_tx.send(EndpointEvent::Ready).await.unwrap();
    let err = h.manager.request_link().await.unwrap_err();
    assert_matches!(err, SessionError::AuthFailed);
    assert_eq!(h.manager.state().await.state, SessionState::AuthFailed);

    // Explicit reset is the way out.
    h.manager.reset().await;
    assert_eq!(h.manager.state().await.state, SessionState::Idle);
    h.manager.request_link().await.unwrap();
}

#[tokio::test]
async fn logout_forces_idle_and_relinks() {
    let mut h = start(SessionConfig {
        relink_delay: Duration::from_millis(20),
        ..Default::default()
    });

    h.events_tx.send(EndpointEvent::Ready).await.unwrap();
    assert_eq!(next_state(&mut h.bus_rx).await, "ready");

    h.manager.logout().await.unwrap();
    assert_eq!(h.manager.state().await.state, SessionState::Idle);
    assert_eq!(h.endpoint.disconnect_calls.load(Ordering::SeqCst), 1);

    // Auto relink follows logout.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(h.endpoint.connect_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn ready_resets_auth_failure_count() {
    let mut h = start(SessionConfig {
        relink_delay: Duration::from_secs(60),
        auth_failure_ceiling: 2,
    });

    h.events_tx
        .send(EndpointEvent::AuthFailure { reason: "flaky".into() })
        .await
        .unwrap();
    assert_eq!(next_state(&mut h.bus_rx).await, "idle");

    // A successful link clears the slate...
    h.events_tx.send(EndpointEvent::Ready).await.unwrap();
    assert_eq!(next_state(&mut h.bus_rx).await, "ready");

    // ...so one more failure does not reach the ceiling.
    h.events_tx
        .send(EndpointEvent::Disconnected { reason: "gone".into() })
        .await
        .unwrap();
    assert_eq!(next_state(&mut h.bus_rx).await, "disconnected");
    h.events_tx
        .send(EndpointEvent::AuthFailure { reason: "flaky".into() })
        .await
        .unwrap();
    assert_eq!(next_state(&mut h.bus_rx).await, "idle");
    assert_eq!(h.manager.state().await.state, SessionState::Idle);
}
