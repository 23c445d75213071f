//! Bulk-send job description and counters.

use beamline_core::types::DbId;
use beamline_gateway::endpoint::Attachment;
use serde::Deserialize;

/// One normalized recipient. Contact-file normalization happens upstream
/// (the import layer); the engine only ever sees this shape.
#[derive(Debug, Clone, Deserialize)]
pub struct Recipient {
    /// Network address (e.g. a phone number in network form).
    pub address: String,
    /// Name used for `{name}` personalization, when known.
    pub display_name: Option<String>,
}

/// One bulk-send invocation. Ephemeral: built per request, consumed by
/// the engine, gone when the job completes.
#[derive(Debug)]
pub struct DispatchJob {
    /// Send order is list order, first to last.
    pub recipients: Vec<Recipient>,
    /// May contain the `{name}` placeholder.
    pub message_template: String,
    /// Saved template this message came from, for the outcome log.
    pub template_id: Option<DbId>,
    /// Released (deleted) after the job completes, success or failure.
    pub attachment: Option<Attachment>,
}

/// Live counters of a running job. Strictly monotonic within the job.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobCounters {
    pub total: usize,
    pub current: usize,
    pub sent: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let counters = JobCounters::default();
        assert_eq!(
            (counters.total, counters.current, counters.sent, counters.failed),
            (0, 0, 0, 0)
        );
    }
}
