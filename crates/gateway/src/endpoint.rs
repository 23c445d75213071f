//! The Messaging Endpoint capability.
//!
//! Everything the platform knows about the external chat network goes
//! through [`ChatEndpoint`] and the [`EndpointEvent`] stream handed out
//! alongside a concrete endpoint. The production implementation is
//! [`RemoteEndpoint`](crate::remote::RemoteEndpoint); tests script their
//! own.

use std::path::PathBuf;

use async_trait::async_trait;

/// A transient file sent alongside a message, consumed once per job.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub path: PathBuf,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

/// Link-state events emitted by the endpoint.
#[derive(Debug, Clone)]
pub enum EndpointEvent {
    /// The network issued a pairing payload for the user to scan.
    LinkRequestIssued { token: String },
    /// The scan was accepted; the session is loading.
    Authenticated,
    /// The session is fully usable.
    Ready,
    /// The link dropped.
    Disconnected { reason: String },
    /// The network rejected our stored credentials.
    AuthFailure { reason: String },
}

/// Failures surfaced by endpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// No live connection to the bridge.
    #[error("Not connected to the messaging network")]
    NotConnected,

    /// Establishing or using the bridge connection failed.
    #[error("Bridge connection error: {0}")]
    Connection(String),

    /// The network reported a delivery failure for one recipient.
    #[error("{0}")]
    Send(String),

    /// The bridge did not answer a command in time.
    #[error("Bridge request timed out")]
    Timeout,
}

/// Opaque capability over the external chat network.
///
/// The contract is deliberately small: connect/disconnect the device
/// link, deliver to one recipient, and probe reachability. Delivery is
/// at-most-once; the endpoint does not retry.
#[async_trait]
pub trait ChatEndpoint: Send + Sync {
    /// Start (or re-start) the device link. Idempotent when already live.
    async fn connect(&self) -> Result<(), EndpointError>;

    /// Tear the device link down.
    async fn disconnect(&self) -> Result<(), EndpointError>;

    /// Deliver one message, with an optional attachment.
    async fn send(
        &self,
        address: &str,
        message: &str,
        attachment: Option<&Attachment>,
    ) -> Result<(), EndpointError>;

    /// Whether an address exists on the network.
    async fn is_reachable(&self, address: &str) -> Result<bool, EndpointError>;
}
