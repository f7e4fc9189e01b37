//! Backoff policy for transient render failures.
//!
//! Kept separate from the personalization stage so retry behavior can be
//! tested and reasoned about on its own.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Bounded exponential backoff.
///
/// The delay before retry `n` (0-indexed) is `initial * 2^n`, randomized by
/// `jitter_factor`. Only failures classified as transient are retried at
/// all; permanent failures propagate on the first attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the initial attempt; a call runs at most
    /// `max_retries + 1` times.
    ///
    /// Default: 3
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry. Each further retry doubles it.
    ///
    /// Default: 1000 ms
    #[serde(default = "defaults::initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Fraction randomizing each delay so simultaneous retries don't land
    /// together. The delay varies within plus/minus this fraction.
    ///
    /// Default: 0.1
    #[serde(default = "defaults::jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: defaults::max_retries(),
            initial_delay_ms: defaults::initial_delay_ms(),
            jitter_factor: defaults::jitter_factor(),
        }
    }
}

impl RetryPolicy {
    /// Check whether another retry is allowed after `retries_so_far`.
    #[must_use]
    pub const fn should_retry(&self, retries_so_far: u32) -> bool {
        retries_so_far < self.max_retries
    }

    /// The jittered delay before the given retry (0-indexed).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        // base * 2^retry with saturating math; a shift past 63 would wrap
        let base = if retry >= 63 {
            u64::MAX
        } else {
            self.initial_delay_ms.saturating_mul(1_u64 << retry)
        };

        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "Randomization does not need exact millisecond precision"
        )]
        let jittered = if self.jitter_factor > 0.0 {
            let range = (base as f64) * self.jitter_factor;
            let jitter: f64 = rand::rng().random_range(-range..=range);
            ((base as f64) + jitter).max(0.0) as u64
        } else {
            base
        };

        Duration::from_millis(jittered)
    }
}

mod defaults {
    pub const fn max_retries() -> u32 {
        3
    }

    pub const fn initial_delay_ms() -> u64 {
        1000
    }

    pub const fn jitter_factor() -> f64 {
        0.1
    }
}
