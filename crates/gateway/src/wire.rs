//! Bridge WebSocket protocol types and parser.
//!
//! The bridge sidecar speaks JSON frames of the shape
//! `{"type": "<kind>", "data": {...}}` towards us, and we answer with
//! `{"op": "<command>", ...}` frames. This module holds the typed forms
//! of both directions.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Bridge -> backend
// ---------------------------------------------------------------------------

/// All known frames the bridge sends us.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BridgeMessage {
    /// A pairing payload was issued for the user to scan.
    LinkRequestIssued(LinkRequestData),

    /// The scan was accepted.
    Authenticated,

    /// The device link is fully usable.
    Ready,

    /// The device link dropped.
    Disconnected(DisconnectedData),

    /// The network rejected the stored credentials.
    AuthFailure(AuthFailureData),

    /// Answer to a command we issued (send / reachability probe).
    CommandResult(CommandResultData),
}

/// Payload for `link_request_issued` frames.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkRequestData {
    /// Rendered pairing payload (e.g. a data-URL scan code).
    pub token: String,
}

/// Payload for `disconnected` frames.
#[derive(Debug, Clone, Deserialize)]
pub struct DisconnectedData {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Payload for `auth_failure` frames.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthFailureData {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Payload for `command_result` frames.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandResultData {
    /// Correlation id we put on the command.
    pub id: String,
    pub ok: bool,
    /// Set on `is_reachable` answers.
    #[serde(default)]
    pub reachable: Option<bool>,
    /// Failure description when `ok` is false.
    #[serde(default)]
    pub error: Option<String>,
}

/// Parse one text frame from the bridge.
pub fn parse_message(text: &str) -> Result<BridgeMessage, serde_json::Error> {
    serde_json::from_str(text)
}

// ---------------------------------------------------------------------------
// Backend -> bridge
// ---------------------------------------------------------------------------

/// Commands we issue to the bridge.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BridgeCommand {
    /// Deliver one message.
    Send {
        id: String,
        address: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        attachment: Option<AttachmentRef>,
    },

    /// Probe whether an address exists on the network.
    IsReachable { id: String, address: String },

    /// Invalidate the device link.
    Disconnect,
}

/// File reference passed to the bridge for attachment sends.
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentRef {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}
