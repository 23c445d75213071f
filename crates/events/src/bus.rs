//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`PlatformEvent`]s. It is
//! shared via `Arc<EventBus>` across the application. Delivery contract:
//! every subscriber receives every event published after it subscribed, in
//! publish order, at most once; there is no replay of earlier events, and
//! dropping a receiver unsubscribes immediately and silently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

/// The event streams observers can tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    /// Device-link session state changed.
    SessionState,
    /// A license key was activated for a user.
    LicenseActivated,
    /// A bulk-send job was accepted and is starting.
    DispatchStarted,
    /// One recipient of a running job was processed.
    DispatchProgress,
    /// A bulk-send job finished.
    DispatchComplete,
}

impl Topic {
    /// Wire name used in WebSocket frames (`session-state`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::SessionState => "session-state",
            Topic::LicenseActivated => "license-activated",
            Topic::DispatchStarted => "dispatch-started",
            Topic::DispatchProgress => "dispatch-progress",
            Topic::DispatchComplete => "dispatch-complete",
        }
    }
}

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// One event on the bus: a topic, a JSON payload, and when it happened.
///
/// Payloads are built by the emitting subsystem through the constructor
/// methods below, so each topic's shape is defined in exactly one place.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformEvent {
    pub topic: Topic,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    /// Create an event with an arbitrary payload.
    pub fn new(topic: Topic, payload: serde_json::Value) -> Self {
        Self {
            topic,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// `session-state`: `{state, link_token?}`.
    pub fn session_state(state: &str, link_token: Option<&str>) -> Self {
        Self::new(
            Topic::SessionState,
            serde_json::json!({ "state": state, "link_token": link_token }),
        )
    }

    /// `license-activated`: `{key, user_id, expires_at}`.
    pub fn license_activated(
        key: &str,
        user_id: beamline_core::types::DbId,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            Topic::LicenseActivated,
            serde_json::json!({ "key": key, "user_id": user_id, "expires_at": expires_at }),
        )
    }

    /// `dispatch-started`: `{total}`.
    pub fn dispatch_started(total: usize) -> Self {
        Self::new(Topic::DispatchStarted, serde_json::json!({ "total": total }))
    }

    /// `dispatch-progress`: one frame per processed recipient.
    #[allow(clippy::too_many_arguments)]
    pub fn dispatch_progress(
        address: &str,
        display_name: Option<&str>,
        status: &str,
        error: Option<&str>,
        current: usize,
        total: usize,
        sent: usize,
        failed: usize,
    ) -> Self {
        Self::new(
            Topic::DispatchProgress,
            serde_json::json!({
                "address": address,
                "display_name": display_name,
                "status": status,
                "error": error,
                "current": current,
                "total": total,
                "sent": sent,
                "failed": failed,
            }),
        )
    }

    /// `dispatch-complete`: `{total, sent, failed}`.
    pub fn dispatch_complete(total: usize, sent: usize, failed: usize) -> Self {
        Self::new(
            Topic::DispatchComplete,
            serde_json::json!({ "total": total, "sent": sent, "failed": failed }),
        )
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`PlatformEvent`]. Subscribers
/// never slow down publishers; a receiver that falls more than the buffer
/// capacity behind observes `RecvError::Lagged` and skips ahead.
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is dropped.
    pub fn publish(&self, event: PlatformEvent) {
        tracing::trace!(topic = event.topic.as_str(), "Publishing event");
        // SendError only means there are zero receivers right now.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(PlatformEvent::dispatch_started(12));

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.topic, Topic::DispatchStarted);
        assert_eq!(received.payload["total"], 12);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(PlatformEvent::session_state("ready", None));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.topic, Topic::SessionState);
        assert_eq!(e2.topic, Topic::SessionState);
        assert_eq!(e1.payload["state"], "ready");
    }

    #[tokio::test]
    async fn late_subscriber_gets_no_replay() {
        let bus = EventBus::default();
        bus.publish(PlatformEvent::dispatch_started(3));

        let mut rx = bus.subscribe();
        bus.publish(PlatformEvent::dispatch_complete(3, 3, 0));

        // Only the event published after subscribing arrives.
        let received = rx.recv().await.expect("should receive the later event");
        assert_eq!(received.topic, Topic::DispatchComplete);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(PlatformEvent::dispatch_complete(1, 0, 1));
    }

    #[test]
    fn topic_wire_names_are_kebab_case() {
        assert_eq!(Topic::SessionState.as_str(), "session-state");
        assert_eq!(Topic::DispatchProgress.as_str(), "dispatch-progress");
        assert_eq!(Topic::DispatchComplete.as_str(), "dispatch-complete");
    }

    #[test]
    fn progress_payload_carries_counters() {
        let event = PlatformEvent::dispatch_progress(
            "15551234567",
            Some("Ana"),
            "sent",
            None,
            2,
            10,
            2,
            0,
        );
        assert_eq!(event.payload["current"], 2);
        assert_eq!(event.payload["total"], 10);
        assert_eq!(event.payload["sent"], 2);
        assert_eq!(event.payload["failed"], 0);
        assert_eq!(event.payload["status"], "sent");
    }
}
