//! Progress aggregation and the out-of-band event stream.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Instant,
};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

use crate::types::{DispatchResult, Outcome};

/// Running aggregate emitted while a batch is in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub total: usize,
    pub percentage: f64,

    /// Rotation slot that produced the most recent result.
    pub slot: usize,

    pub last_outcome: Outcome,

    /// `(total - processed) * elapsed / processed`, in milliseconds.
    pub estimated_remaining_ms: u64,
}

/// Discrete events observers receive out-of-band, never through the
/// submission call. Exactly one terminal event (`Completed`, `Aborted`, or
/// `Error`) closes every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress(BatchSummary),
    Completed { total: usize },
    Aborted { processed: usize, total: usize },
    Error { message: String },
}

/// Aggregates per-unit completions into cadenced summaries.
///
/// `record` is called by every dispatch unit as it completes. The processed
/// count is atomic, so concurrent units each take a unique ordinal and the
/// cadence stays exact: every `report_every`-th completion emits, plus the
/// final one unconditionally.
pub struct ProgressReporter {
    total: usize,
    report_every: usize,
    started: Instant,
    processed: AtomicUsize,
    events: broadcast::Sender<ProgressEvent>,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(total: usize, report_every: usize, events: broadcast::Sender<ProgressEvent>) -> Self {
        Self {
            total,
            report_every: report_every.max(1),
            started: Instant::now(),
            processed: AtomicUsize::new(0),
            events,
        }
    }

    /// Completed units so far.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    /// Record one completed unit; emits a summary when the cadence or the
    /// final completion says so.
    pub fn record(&self, result: &DispatchResult, slot: usize) {
        let processed = self.processed.fetch_add(1, Ordering::SeqCst) + 1;
        if processed % self.report_every != 0 && processed != self.total {
            return;
        }

        let summary = self.summarize(processed, slot, result.outcome.clone());
        info!(
            processed = summary.processed,
            total = summary.total,
            percentage = summary.percentage,
            slot = summary.slot,
            sent = summary.last_outcome.is_sent(),
            estimated_remaining_ms = summary.estimated_remaining_ms,
            "Batch progress"
        );
        // A send error only means no observer is subscribed right now.
        let _ = self.events.send(ProgressEvent::Progress(summary));
    }

    fn summarize(&self, processed: usize, slot: usize, last_outcome: Outcome) -> BatchSummary {
        let remaining = self.total.saturating_sub(processed);
        let elapsed_ms = self.started.elapsed().as_millis();
        let estimated_remaining_ms =
            u64::try_from((remaining as u128).saturating_mul(elapsed_ms) / (processed.max(1) as u128))
                .unwrap_or(u64::MAX);

        #[allow(
            clippy::cast_precision_loss,
            reason = "Counts stay far below the f64 mantissa"
        )]
        let percentage = (processed as f64 / self.total.max(1) as f64) * 100.0;

        BatchSummary {
            processed,
            total: self.total,
            percentage,
            slot,
            last_outcome,
            estimated_remaining_ms,
        }
    }
}
