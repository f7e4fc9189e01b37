//! Document rendering capability seam.

use async_trait::async_trait;

use crate::{error::RenderError, types::OutputFormat};

/// Renders personalized HTML into an attachable document.
///
/// Implementations wrap whatever actually produces the bytes - a headless
/// browser pool, a conversion API. The engine cares only about the
/// transient/permanent split on failure: transient failures go through the
/// personalization stage's backoff, permanent ones fail the target
/// immediately.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Produce the document for `html` in the requested format.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Unsupported`] for formats the implementation
    /// cannot produce, transient variants for failures worth retrying, and
    /// [`RenderError::Rejected`] when the renderer refused the document.
    async fn render(&self, html: &str, format: OutputFormat) -> Result<Vec<u8>, RenderError>;
}
