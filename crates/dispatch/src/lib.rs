//! The Dispatch Engine.
//!
//! Runs one bulk-send job at a time against a ready session: paced,
//! strictly sequential, per-recipient personalization, outcome logged
//! before the loop advances, one progress event per recipient.

pub mod engine;
pub mod job;
pub mod pacer;

pub use engine::{Accepted, DispatchEngine, DispatchError, EngineConfig};
pub use job::{DispatchJob, JobCounters, Recipient};
pub use pacer::{FixedDelayPacer, NoDelayPacer, Pacer};
