//! Progress broadcasting for the Beamline platform.
//!
//! A single in-process [`bus::EventBus`] fans session, license, and
//! dispatch events out to any number of subscribers (WebSocket
//! connections, background services, tests).

pub mod bus;

pub use bus::{EventBus, PlatformEvent, Topic};
