//! Batch dispatch engine for personalized outbound mail
//!
//! This crate provides functionality to:
//! - Rotate targets across pools of sender credentials, subjects, and
//!   display names, with one reusable transport handle per credential
//! - Personalize templates and generate attachments per target, with
//!   bounded backoff on transient render failures
//! - Dispatch with a hard concurrency cap, chunked sequencing, and
//!   inter-chunk backpressure
//! - Aggregate partial failures and report progress out-of-band
//!
//! The actual transport, renderer, and template syntax live behind the
//! [`Transport`], [`DocumentRenderer`], and [`TemplateEngine`] seams; the
//! engine owns everything between a submitted request and the per-target
//! results.

mod batch;
mod config;
mod dispatch;
mod error;
mod personalize;
mod pool;
mod progress;
mod render;
mod retry;
mod rotation;
mod scheduler;
mod sequencer;
mod template;
mod transport;
mod types;
mod verify;

pub use batch::{BatchDispatcher, BatchHandle, BatchReport, Termination};
pub use config::{ConfigError, DispatchConfig};
pub use dispatch::Dispatcher;
pub use error::{
    DeliveryError, DispatchError, ErrorKind, FatalError, RenderError, TemplateError,
    ValidationError,
};
pub use personalize::{Personalized, Personalizer};
pub use pool::ClientPool;
pub use progress::{BatchSummary, ProgressEvent, ProgressReporter};
pub use render::DocumentRenderer;
pub use retry::RetryPolicy;
pub use rotation::{RotationSelector, Selection};
pub use scheduler::run_bounded;
pub use sequencer::{ChunkSequencer, SequenceReport};
pub use template::{CompiledTemplate, TagMap, TemplateCache, TemplateEngine};
pub use transport::{DeliveryReceipt, OutboundMessage, Transport, TransportFactory};
pub use types::{
    Attachment, BatchRequest, DispatchResult, GenerationSpec, Outcome, OutputFormat, PoolKey,
    SenderCredential, Target,
};
pub use verify::{VerifyOutcome, VerifyStatus, verify_credentials};
