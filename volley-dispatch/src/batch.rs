//! Batch submission: validation, acknowledgement, and the background run.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{sync::broadcast, task::JoinHandle};
use tracing::error;
use ulid::Ulid;
use volley_common::internal;

use crate::{
    config::DispatchConfig,
    dispatch::Dispatcher,
    error::ValidationError,
    personalize::Personalizer,
    pool::ClientPool,
    progress::{ProgressEvent, ProgressReporter},
    render::DocumentRenderer,
    sequencer::ChunkSequencer,
    template::TemplateEngine,
    transport::TransportFactory,
    types::{BatchRequest, DispatchResult},
};

/// Events buffered per subscriber before laggards start losing the oldest.
const EVENT_BUFFER: usize = 256;

/// How a finished batch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Completed,
    Aborted,
    Failed(String),
}

/// The in-memory report for one batch. Persistence is the caller's concern;
/// the engine hands the results over and forgets them.
#[derive(Debug)]
pub struct BatchReport {
    pub batch_id: Ulid,

    /// One result per dispatched target, completion-ordered.
    pub results: Vec<DispatchResult>,

    pub termination: Termination,
}

/// Control handle returned synchronously at submission, before anything has
/// been dispatched. Holding it is optional; the run proceeds regardless.
#[derive(Debug)]
pub struct BatchHandle {
    batch_id: Ulid,
    accepted: usize,
    abort: Arc<AtomicBool>,
    task: JoinHandle<BatchReport>,
}

impl BatchHandle {
    #[must_use]
    pub const fn batch_id(&self) -> Ulid {
        self.batch_id
    }

    /// Number of targets accepted for dispatch.
    #[must_use]
    pub const fn accepted(&self) -> usize {
        self.accepted
    }

    /// Ask the run to stop before its next chunk. In-flight units finish.
    pub fn abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    /// Wait for the background run and take its report.
    pub async fn join(self) -> BatchReport {
        let batch_id = self.batch_id;
        self.task.await.unwrap_or_else(|join_error| BatchReport {
            batch_id,
            results: Vec::new(),
            termination: Termination::Failed(format!("batch task panicked: {join_error}")),
        })
    }
}

/// The engine's submission boundary.
///
/// Owns the process-scoped state every run shares - the transport pool and
/// the personalization caches - and the broadcast channel progress flows
/// through. Each accepted request runs on its own background task,
/// observable only through [`subscribe`](Self::subscribe).
pub struct BatchDispatcher {
    config: DispatchConfig,
    dispatcher: Arc<Dispatcher>,
    events: broadcast::Sender<ProgressEvent>,
}

impl BatchDispatcher {
    #[must_use]
    pub fn new(
        config: DispatchConfig,
        factory: Arc<dyn TransportFactory>,
        engine: Arc<dyn TemplateEngine>,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> Self {
        let pool = ClientPool::new(factory);
        let personalizer = Personalizer::new(engine, renderer, config.render_retry.clone());
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        Self {
            config,
            dispatcher: Arc::new(Dispatcher::new(pool, personalizer)),
            events,
        }
    }

    /// The out-of-band progress stream. Subscribe before submitting to see
    /// every event of a run.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// The process-scoped dispatch state (pool and caches) shared by every
    /// run.
    #[must_use]
    pub const fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Accept a batch and start dispatching it in the background.
    ///
    /// Returns as soon as the request validates - before anything is sent.
    /// The acknowledgement carries the accepted total only; completion
    /// arrives later as a terminal event, so callers must not treat the
    /// returned handle as proof of delivery.
    ///
    /// # Errors
    ///
    /// Malformed submissions are rejected here, synchronously, before any
    /// dispatch begins.
    pub fn submit(&self, request: BatchRequest) -> Result<BatchHandle, ValidationError> {
        validate(&request)?;

        let batch_id = Ulid::new();
        let accepted = request.targets.len();
        let abort = Arc::new(AtomicBool::new(false));

        internal!(
            level = INFO,
            "Batch {batch_id} accepted with {accepted} targets"
        );

        let sequencer = ChunkSequencer::new(
            self.config.chunk_size,
            Duration::from_millis(self.config.inter_chunk_delay_ms),
            self.config.max_concurrency,
        );
        let request = Arc::new(request);
        let dispatcher = Arc::clone(&self.dispatcher);
        let reporter = Arc::new(ProgressReporter::new(
            accepted,
            self.config.report_every,
            self.events.clone(),
        ));
        let events = self.events.clone();
        let abort_flag = Arc::clone(&abort);

        let task = tokio::spawn(async move {
            match sequencer
                .process(&request, &dispatcher, &reporter, &abort_flag)
                .await
            {
                Ok(sequence) if sequence.aborted => {
                    let _ = events.send(ProgressEvent::Aborted {
                        processed: sequence.results.len(),
                        total: accepted,
                    });
                    BatchReport {
                        batch_id,
                        results: sequence.results,
                        termination: Termination::Aborted,
                    }
                }
                Ok(sequence) => {
                    internal!(level = INFO, "Batch {batch_id} sequence complete");
                    let _ = events.send(ProgressEvent::Completed { total: accepted });
                    BatchReport {
                        batch_id,
                        results: sequence.results,
                        termination: Termination::Completed,
                    }
                }
                Err(fatal) => {
                    error!(batch_id = %batch_id, error = %fatal, "Batch sequencing failed");
                    let _ = events.send(ProgressEvent::Error {
                        message: fatal.to_string(),
                    });
                    BatchReport {
                        batch_id,
                        results: Vec::new(),
                        termination: Termination::Failed(fatal.to_string()),
                    }
                }
            }
        });

        Ok(BatchHandle {
            batch_id,
            accepted,
            abort,
            task,
        })
    }
}

/// Synchronous submission checks; nothing dispatches for a rejected
/// request. Empty rotation pools are rejected here rather than failing on a
/// zero modulus mid-run.
fn validate(request: &BatchRequest) -> Result<(), ValidationError> {
    if request.targets.is_empty() {
        return Err(ValidationError::NoTargets);
    }
    if request.credentials.is_empty() {
        return Err(ValidationError::NoCredentials);
    }
    if request.subjects.is_empty() {
        return Err(ValidationError::NoSubjects);
    }
    if request.sender_names.is_empty() {
        return Err(ValidationError::NoSenderNames);
    }
    Ok(())
}
