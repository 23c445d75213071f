//! Pacing between sends.
//!
//! The delay between recipients is a deliberate floor to stay clear of
//! endpoint-side rate limiting. It is injected as a trait so tests run
//! with a zero-delay pacer instead of waiting in real time.

use std::time::Duration;

use async_trait::async_trait;

/// Waits between consecutive sends of a job.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self);
}

/// Production pacer: a fixed `tokio::time::sleep` floor.
pub struct FixedDelayPacer {
    delay: Duration,
}

impl FixedDelayPacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Pacer for FixedDelayPacer {
    async fn pause(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

/// Test pacer: yields without sleeping.
pub struct NoDelayPacer;

#[async_trait]
impl Pacer for NoDelayPacer {
    async fn pause(&self) {
        tokio::task::yield_now().await;
    }
}
