//! WebSocket fan-out of platform events to UI clients.

pub mod handler;
