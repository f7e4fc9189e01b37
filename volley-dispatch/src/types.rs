//! Core data model for batch dispatch.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// One recipient. Produces exactly one [`DispatchResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Recipient address; also the identity results are keyed by.
    pub email: String,

    /// Display name; defaults during personalization when absent.
    #[serde(default)]
    pub name: Option<String>,

    /// Pre-assigned invoice id; generated during personalization when
    /// absent.
    #[serde(default)]
    pub invoice_id: Option<String>,

    /// Free-form tags merged into the template context. On key collision
    /// the custom value wins over the derived one.
    #[serde(default)]
    pub custom: AHashMap<String, String>,
}

/// A sender identity plus the endpoint it authenticates against.
#[derive(Clone, Serialize, Deserialize)]
pub struct SenderCredential {
    /// Sender address, and the account identifier for pooling.
    pub email: String,

    /// Login user; falls back to `email` when absent.
    #[serde(default)]
    pub username: Option<String>,

    /// Authentication secret. Redacted from `Debug` output.
    pub password: String,

    /// Endpoint host.
    pub host: String,

    /// Endpoint port.
    #[serde(default = "default_port")]
    pub port: u16,
}

const fn default_port() -> u16 {
    587
}

impl SenderCredential {
    /// The user this credential authenticates as.
    #[must_use]
    pub fn login_user(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.email)
    }

    /// The pooling identity: at most one live transport handle exists per
    /// key.
    #[must_use]
    pub fn pool_key(&self) -> PoolKey {
        PoolKey {
            account: self.email.clone(),
            endpoint: self.host.clone(),
        }
    }
}

impl std::fmt::Debug for SenderCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderCredential")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

/// Deterministic (account identifier, endpoint) pooling key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub account: String,
    pub endpoint: String,
}

/// Requested attachment output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// No generated attachment; the body itself is the document.
    Html,
    Pdf,
    Png,
    Jpg,
    Docx,
}

impl OutputFormat {
    /// File extension for generated attachments.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Docx => "docx",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// An encoded attachment, either generated per target or passed through
/// untransformed from the submission.
#[derive(Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("filename", &self.filename)
            .field("content_len", &self.content.len())
            .finish()
    }
}

/// Template and attachment settings shared by every target in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSpec {
    /// HTML body template; also the render input when `format` is not
    /// [`OutputFormat::Html`].
    pub html_template: String,

    /// Plain-text body template.
    pub text_template: String,

    #[serde(default = "default_format")]
    pub format: OutputFormat,

    /// Raw attachments appended to every message without transformation.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

const fn default_format() -> OutputFormat {
    OutputFormat::Html
}

/// A complete submission. Immutable for the duration of a run.
///
/// The credential, subject, and sender-name pools are parallel: each is
/// cycled independently by target index, so they may have different
/// lengths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub targets: Vec<Target>,
    pub credentials: Vec<SenderCredential>,
    pub subjects: Vec<String>,
    pub sender_names: Vec<String>,
    pub generation: GenerationSpec,
}

/// Terminal state of one dispatch unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The transport accepted the message.
    Sent {
        /// Receipt identifier from the transport.
        message_id: String,
    },

    /// Some step of the dispatch unit failed; the rest of the batch is
    /// unaffected.
    Failed {
        kind: ErrorKind,
        detail: String,
    },
}

impl Outcome {
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

/// The single record produced for one target. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResult {
    /// The target's email - the identity side of the 1:1 target->result
    /// mapping.
    pub email: String,

    pub outcome: Outcome,

    /// Unix epoch milliseconds at completion.
    pub completed_at_ms: i64,
}
