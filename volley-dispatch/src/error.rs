//! Typed error handling for dispatch operations.
//!
//! The taxonomy distinguishes:
//! - Per-target failures (template, render, delivery) - caught at the
//!   dispatch unit boundary and folded into a `Failed` outcome
//! - Transient render failures - retried with backoff
//! - Sequencing failures - the only kind that halts a batch

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::OutputFormat;

/// Rejection of a submission before any dispatch begins.
///
/// Surfaced synchronously to the submitter; a rejected request never
/// reaches the sequencer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A batch without targets has nothing to dispatch.
    #[error("target list is empty")]
    NoTargets,

    /// Rotation requires at least one credential.
    #[error("credential pool is empty")]
    NoCredentials,

    /// Rotation requires at least one subject.
    #[error("subject pool is empty")]
    NoSubjects,

    /// Rotation requires at least one sender display name.
    #[error("sender name pool is empty")]
    NoSenderNames,
}

/// Template compilation or injection failure.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template source does not compile.
    #[error("template failed to compile: {0}")]
    Compile(String),

    /// Injection of tag data into a compiled template failed.
    #[error("template failed to render: {0}")]
    Inject(String),
}

/// Document rendering failure, split by whether a retry can change the
/// outcome.
///
/// Timeouts, unreachable renderers, and rate limiting are transient; a
/// rejected document or an unsupported format will fail the same way every
/// time.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The renderer did not answer in time.
    #[error("render timed out: {0}")]
    Timeout(String),

    /// The renderer could not be reached.
    #[error("renderer unreachable: {0}")]
    Connection(String),

    /// The renderer is shedding load (HTTP 429).
    #[error("renderer rate limited: {0}")]
    RateLimited(String),

    /// The renderer rejected the document (other 4xx).
    #[error("renderer rejected the document ({status}): {message}")]
    Rejected {
        /// Status code reported by the renderer.
        status: u16,
        /// Renderer-provided detail.
        message: String,
    },

    /// The implementation cannot produce this format.
    #[error("unsupported output format: {0}")]
    Unsupported(OutputFormat),
}

impl RenderError {
    /// Returns `true` if a retry may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Connection(_) | Self::RateLimited(_)
        )
    }

    /// Returns `true` if a retry will not change the outcome.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

/// The transport rejected or failed to send a message.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Failed to establish a connection to the endpoint.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The endpoint did not answer in time.
    #[error("connection timed out: {0}")]
    Timeout(String),

    /// The credential does not authenticate.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The endpoint refused the message.
    #[error("message rejected: {0}")]
    Rejected(String),

    /// The credential cannot produce a transport handle at all.
    #[error("transport configuration invalid: {0}")]
    Configuration(String),
}

/// A failure in the sequencing control flow itself, not attributable to one
/// target. The only error kind that halts a batch.
#[derive(Debug, Error)]
pub enum FatalError {
    /// A chunk resolved with fewer results than targets. Dispatch units are
    /// infallible, so a missing result means the control flow is broken.
    #[error("chunk produced {actual} results for {expected} targets")]
    ResultsLost {
        /// Targets handed to the chunk.
        expected: usize,
        /// Results the chunk came back with.
        actual: usize,
    },
}

/// Everything that can fail a single dispatch unit.
///
/// Caught at the dispatch unit boundary and converted into a `Failed`
/// outcome for that target only; never rethrown to the scheduler.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Wire-facing classification of a failed outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Template,
    Render,
    Delivery,
}

impl DispatchError {
    /// The classification recorded in a `Failed` outcome.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Template(_) => ErrorKind::Template,
            Self::Render(_) => ErrorKind::Render,
            Self::Delivery(_) => ErrorKind::Delivery,
        }
    }
}
