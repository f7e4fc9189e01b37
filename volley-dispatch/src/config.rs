//! Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::RetryPolicy;

const fn default_max_concurrency() -> usize {
    10
}

const fn default_chunk_size() -> usize {
    500
}

const fn default_inter_chunk_delay_ms() -> u64 {
    1000
}

const fn default_report_every() -> usize {
    50
}

const fn default_verify_concurrency() -> usize {
    5
}

/// Tunables for the batch engine, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum dispatch units in flight at once.
    ///
    /// Default: 10
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Targets per chunk; chunks run strictly one after another.
    ///
    /// Default: 500
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Pause between chunks, giving receiving endpoints recovery time
    /// between bursts. No pause follows the final chunk.
    ///
    /// Default: 1000 ms
    #[serde(default = "default_inter_chunk_delay_ms")]
    pub inter_chunk_delay_ms: u64,

    /// Emit a progress event every Nth completion. The final completion
    /// always reports regardless of cadence.
    ///
    /// Default: 50
    #[serde(default = "default_report_every")]
    pub report_every: usize,

    /// Concurrency cap for credential verification runs. Handshakes are
    /// heavier than pooled sends, so this sits well below
    /// `max_concurrency`.
    ///
    /// Default: 5
    #[serde(default = "default_verify_concurrency")]
    pub verify_concurrency: usize,

    /// Backoff applied to transient render failures.
    #[serde(default)]
    pub render_retry: RetryPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            chunk_size: default_chunk_size(),
            inter_chunk_delay_ms: default_inter_chunk_delay_ms(),
            report_every: default_report_every(),
            verify_concurrency: default_verify_concurrency(),
            render_retry: RetryPolicy::default(),
        }
    }
}

/// Failure to read or parse a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

impl DispatchConfig {
    /// Load configuration from a TOML file. Missing fields take their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}
