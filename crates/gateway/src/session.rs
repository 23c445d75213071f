//! The device-link session state machine, as pure data and functions.
//!
//! ```text
//! Idle --link-request-issued--> AwaitingScan --authenticated--> Authenticating
//!      --ready--> Ready --disconnected--> Disconnected --(backoff)--> relink
//! ```
//!
//! Auth failures are counted by the [`SessionManager`](crate::manager) and
//! are not part of [`transition`]; below the retry ceiling they fold back
//! to `Idle`, at the ceiling the session parks in the terminal
//! `AuthFailed` state until an explicit reset.

use beamline_core::types::Timestamp;
use serde::Serialize;

use crate::endpoint::EndpointEvent;

/// Device-link lifecycle state. One session per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    /// No link activity.
    Idle,
    /// A pairing payload was issued and awaits scanning.
    AwaitingScan,
    /// Scan accepted, session loading.
    Authenticating,
    /// Fully usable.
    Ready,
    /// Link dropped; a relink is (or will be) scheduled.
    Disconnected,
    /// Credentials rejected past the retry ceiling. Terminal until reset.
    AuthFailed,
}

impl SessionState {
    /// Wire name (`idle`, `awaiting-scan`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingScan => "awaiting-scan",
            SessionState::Authenticating => "authenticating",
            SessionState::Ready => "ready",
            SessionState::Disconnected => "disconnected",
            SessionState::AuthFailed => "auth-failed",
        }
    }

    /// States in which a link request is already in flight or satisfied,
    /// making `request_link` a no-op.
    pub fn link_in_progress(&self) -> bool {
        matches!(
            self,
            SessionState::AwaitingScan | SessionState::Authenticating | SessionState::Ready
        )
    }
}

/// Read-only view of the session handed to callers and event payloads.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// Pairing payload; present only while awaiting a scan.
    pub link_token: Option<String>,
    /// When the current state was entered.
    pub since: Timestamp,
}

/// Compute the successor state for a link event, or `None` when the event
/// does not apply in the current state (and must be ignored).
///
/// `AuthFailure` events never reach this function; the manager handles
/// them against the retry ceiling.
pub fn transition(current: SessionState, event: &EndpointEvent) -> Option<SessionState> {
    use SessionState::*;

    match event {
        // A fresh pairing payload always supersedes whatever link state we
        // had, except the terminal failure state.
        EndpointEvent::LinkRequestIssued { .. } => match current {
            AuthFailed => None,
            _ => Some(AwaitingScan),
        },
        // Stored credentials allow authenticating without a scan.
        EndpointEvent::Authenticated => match current {
            Idle | AwaitingScan | Disconnected => Some(Authenticating),
            _ => None,
        },
        EndpointEvent::Ready => match current {
            Idle | AwaitingScan | Authenticating | Disconnected => Some(Ready),
            _ => None,
        },
        EndpointEvent::Disconnected { .. } => match current {
            AwaitingScan | Authenticating | Ready => Some(Disconnected),
            _ => None,
        },
        EndpointEvent::AuthFailure { .. } => None,
    }
}
