//! [`DispatchEngine`]: the paced, sequential bulk-send loop.
//!
//! One job at a time, by design: the external endpoint does not tolerate
//! concurrent sends reliably, so the loop never overlaps deliveries, and
//! a second submission while a job runs is rejected outright rather than
//! queued. Every recipient produces exactly one persisted outcome row
//! (written before the loop advances) and exactly one progress event.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use beamline_core::personalize::resolve_message;
use beamline_db::ledger::Ledger;
use beamline_db::models::NewOutcome;
use beamline_events::{EventBus, PlatformEvent};
use beamline_gateway::endpoint::{Attachment, ChatEndpoint};
use beamline_gateway::manager::SessionManager;
use beamline_gateway::session::SessionState;

use crate::job::{DispatchJob, JobCounters, Recipient};
use crate::pacer::Pacer;

/// Failure text recorded when a reachability probe says the address is
/// not on the network. Delivery is not attempted in that case.
const NOT_REACHABLE: &str = "recipient not reachable on the messaging network";

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Probe reachability before each delivery attempt.
    pub check_reachability: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_reachability: true,
        }
    }
}

/// Dispatch-domain failures. All are synchronous rejections of `submit`;
/// per-recipient delivery failures never surface here (they are recorded
/// and the job continues).
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Messaging session is not ready")]
    SessionNotReady,

    #[error("A dispatch job is already running")]
    JobAlreadyRunning,

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Acknowledgement that a job was accepted and started.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Accepted {
    pub total: usize,
}

/// The Dispatch Engine. One per process, shared via `Arc`.
pub struct DispatchEngine {
    endpoint: Arc<dyn ChatEndpoint>,
    session: Arc<SessionManager>,
    ledger: Arc<dyn Ledger>,
    bus: Arc<EventBus>,
    pacer: Arc<dyn Pacer>,
    config: EngineConfig,
    /// Single-flight guard: set for the lifetime of one job.
    running: AtomicBool,
}

impl DispatchEngine {
    pub fn new(
        endpoint: Arc<dyn ChatEndpoint>,
        session: Arc<SessionManager>,
        ledger: Arc<dyn Ledger>,
        bus: Arc<EventBus>,
        pacer: Arc<dyn Pacer>,
        config: EngineConfig,
    ) -> Self {
        Self {
            endpoint,
            session,
            ledger,
            bus,
            pacer,
            config,
            running: AtomicBool::new(false),
        }
    }

    /// Whether a job is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Validate and start a job.
    ///
    /// Returns synchronously once the job is accepted; the send loop runs
    /// in a background task and reports through the event bus and the
    /// outcome log. No mid-job cancellation: an accepted job runs to
    /// completion or process termination.
    pub async fn submit(self: &Arc<Self>, job: DispatchJob) -> Result<Accepted, DispatchError> {
        validate(&job)?;

        if self.session.state().await.state != SessionState::Ready {
            return Err(DispatchError::SessionNotReady);
        }

        // Explicit rejection, never queueing: the running flag flips only
        // if no job holds it.
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DispatchError::JobAlreadyRunning);
        }

        let total = job.recipients.len();
        tracing::info!(total, "Dispatch job accepted");
        self.bus.publish(PlatformEvent::dispatch_started(total));

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run_job(job).await;
            engine.running.store(false, Ordering::SeqCst);
        });

        Ok(Accepted { total })
    }

    // ---- internals ----

    /// The sequential send loop. Never two deliveries in flight.
    async fn run_job(&self, job: DispatchJob) {
        let mut counters = JobCounters {
            total: job.recipients.len(),
            ..Default::default()
        };

        for recipient in &job.recipients {
            counters.current += 1;

            let message = resolve_message(&job.message_template, recipient.display_name.as_deref());

            let error = match self
                .deliver(recipient, &message, job.attachment.as_ref())
                .await
            {
                Ok(()) => {
                    counters.sent += 1;
                    None
                }
                Err(reason) => {
                    counters.failed += 1;
                    tracing::warn!(
                        recipient = %recipient.address,
                        error = %reason,
                        "Delivery failed; continuing with next recipient",
                    );
                    Some(reason)
                }
            };
            let status = if error.is_none() { "sent" } else { "failed" };

            // Log before advancing: a crash mid-job must never leave a
            // processed recipient without its outcome row.
            let outcome = NewOutcome {
                recipient: recipient.address.clone(),
                template_id: job.template_id,
                resolved_message: message,
                status: status.to_string(),
                error: error.clone(),
            };
            if let Err(e) = self.ledger.record_outcome(outcome).await {
                tracing::error!(
                    recipient = %recipient.address,
                    error = %e,
                    "Failed to persist dispatch outcome",
                );
            }

            self.bus.publish(PlatformEvent::dispatch_progress(
                &recipient.address,
                recipient.display_name.as_deref(),
                status,
                error.as_deref(),
                counters.current,
                counters.total,
                counters.sent,
                counters.failed,
            ));

            if counters.current < counters.total {
                self.pacer.pause().await;
            }
        }

        if let Some(attachment) = &job.attachment {
            release_attachment(attachment).await;
        }

        tracing::info!(
            total = counters.total,
            sent = counters.sent,
            failed = counters.failed,
            "Dispatch job complete",
        );
        self.bus.publish(PlatformEvent::dispatch_complete(
            counters.total,
            counters.sent,
            counters.failed,
        ));
    }

    /// One delivery attempt. Failures come back as the verbatim error
    /// text that goes into the outcome row.
    async fn deliver(
        &self,
        recipient: &Recipient,
        message: &str,
        attachment: Option<&Attachment>,
    ) -> Result<(), String> {
        if self.config.check_reachability {
            match self.endpoint.is_reachable(&recipient.address).await {
                Ok(true) => {}
                Ok(false) => return Err(NOT_REACHABLE.to_string()),
                Err(e) => return Err(e.to_string()),
            }
        }

        self.endpoint
            .send(&recipient.address, message, attachment)
            .await
            .map_err(|e| e.to_string())
    }
}

/// Synchronous input validation; rejected jobs never start.
fn validate(job: &DispatchJob) -> Result<(), DispatchError> {
    if job.recipients.is_empty() {
        return Err(DispatchError::Validation("no recipients provided".into()));
    }
    if job.message_template.trim().is_empty() {
        return Err(DispatchError::Validation(
            "message template must not be empty".into(),
        ));
    }
    Ok(())
}

/// Delete the transient attachment file. Best effort.
async fn release_attachment(attachment: &Attachment) {
    match tokio::fs::remove_file(&attachment.path).await {
        Ok(()) => {
            tracing::debug!(path = %attachment.path.display(), "Attachment released");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(
                path = %attachment.path.display(),
                error = %e,
                "Failed to release attachment",
            );
        }
    }
}
