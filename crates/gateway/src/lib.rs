//! Device-link gateway to the external chat network.
//!
//! The network itself is an external collaborator reached through a
//! bridge process; this crate owns everything on our side of that line:
//!
//! - [`endpoint`] -- the [`endpoint::ChatEndpoint`] capability the rest of
//!   the platform consumes (send, reachability, connect/disconnect) plus
//!   the [`endpoint::EndpointEvent`] stream the bridge emits.
//! - [`session`] -- the pure device-link state machine.
//! - [`manager`] -- the [`manager::SessionManager`]: consumes endpoint
//!   events, drives the state machine, re-broadcasts transitions, and
//!   re-links after disconnects.
//! - [`remote`] / [`wire`] -- the WebSocket client for a bridge sidecar.
//! - [`credentials`] -- the persisted link-credential directory.

pub mod credentials;
pub mod endpoint;
pub mod manager;
pub mod remote;
pub mod session;
pub mod wire;
