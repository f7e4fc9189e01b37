//! Chunked sequencing with inter-chunk backpressure.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tracing::{debug, info};

use crate::{
    dispatch::Dispatcher,
    error::FatalError,
    progress::ProgressReporter,
    scheduler,
    types::{BatchRequest, DispatchResult, Target},
};

/// The in-memory report a finished sequence hands back to its caller.
#[derive(Debug)]
pub struct SequenceReport {
    /// One result per dispatched target, in completion order.
    pub results: Vec<DispatchResult>,

    /// Whether the run stopped at a chunk boundary on request instead of
    /// draining every chunk.
    pub aborted: bool,
}

/// Drives a batch through the bounded scheduler one chunk at a time.
///
/// Chunks are strictly sequential: chunk n+1 never starts before chunk n
/// has fully resolved, and a pause separates consecutive chunks (none after
/// the last). Instantaneous fan-out is therefore capped at
/// `min(max_concurrency, chunk_size)` - backpressure that compounds with
/// the per-unit concurrency cap.
pub struct ChunkSequencer {
    chunk_size: usize,
    inter_chunk_delay: Duration,
    max_concurrency: usize,
}

impl ChunkSequencer {
    #[must_use]
    pub fn new(chunk_size: usize, inter_chunk_delay: Duration, max_concurrency: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            inter_chunk_delay,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Run every chunk to completion.
    ///
    /// The abort flag is checked cooperatively before each chunk - never
    /// mid-chunk - so an aborted run still hands back every result produced
    /// so far.
    ///
    /// # Errors
    ///
    /// A chunk resolving with fewer results than targets is a sequencing
    /// fault (units are infallible); it halts the run.
    pub async fn process(
        &self,
        request: &Arc<BatchRequest>,
        dispatcher: &Arc<Dispatcher>,
        reporter: &Arc<ProgressReporter>,
        abort: &AtomicBool,
    ) -> Result<SequenceReport, FatalError> {
        let total = request.targets.len();
        let mut results = Vec::with_capacity(total);

        for (chunk_index, start) in (0..total).step_by(self.chunk_size).enumerate() {
            if abort.load(Ordering::SeqCst) {
                info!(
                    processed = results.len(),
                    total, "Batch aborted before chunk {chunk_index}"
                );
                return Ok(SequenceReport {
                    results,
                    aborted: true,
                });
            }

            let end = (start + self.chunk_size).min(total);
            let chunk: Vec<(usize, Target)> = request.targets[start..end]
                .iter()
                .cloned()
                .enumerate()
                .map(|(offset, target)| (start + offset, target))
                .collect();
            let expected = chunk.len();

            debug!(
                chunk = chunk_index,
                start,
                end,
                in_flight_cap = self.max_concurrency,
                "Dispatching chunk"
            );

            let request = Arc::clone(request);
            let dispatcher = Arc::clone(dispatcher);
            let reporter = Arc::clone(reporter);
            let chunk_results = scheduler::run_bounded(
                chunk,
                self.max_concurrency,
                move |(global_index, target)| {
                    let request = Arc::clone(&request);
                    let dispatcher = Arc::clone(&dispatcher);
                    let reporter = Arc::clone(&reporter);
                    async move {
                        dispatcher
                            .dispatch_one(&target, global_index, &request, &reporter)
                            .await
                    }
                },
            )
            .await;

            if chunk_results.len() != expected {
                return Err(FatalError::ResultsLost {
                    expected,
                    actual: chunk_results.len(),
                });
            }

            results.extend(chunk_results);
            info!(processed = results.len(), total, "Chunk {chunk_index} resolved");

            if end < total {
                tokio::time::sleep(self.inter_chunk_delay).await;
            }
        }

        Ok(SequenceReport {
            results,
            aborted: false,
        })
    }
}
