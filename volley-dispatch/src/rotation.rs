//! Index-based rotation across parallel sender pools.

use crate::types::{BatchRequest, SenderCredential};

/// The identity assignment for one target.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub credential: &'a SenderCredential,
    pub subject: &'a str,
    pub sender_name: &'a str,

    /// Credential index in its pool, reported as the rotation slot.
    pub slot: usize,
}

/// Deterministic assignment of targets to sender identities.
///
/// Each pool is indexed independently by `index % pool_len`, so pools of
/// different lengths cycle at different periods - 3 subjects can rotate
/// across 10 credentials without padding either list. The index is the
/// target's absolute position in the unchunked request; chunk boundaries
/// never perturb the cycle.
#[derive(Debug, Clone, Copy)]
pub struct RotationSelector<'a> {
    credentials: &'a [SenderCredential],
    subjects: &'a [String],
    sender_names: &'a [String],
}

impl<'a> RotationSelector<'a> {
    /// Pools must be non-empty; requests are validated at submission before
    /// any selector is built.
    #[must_use]
    pub const fn new(
        credentials: &'a [SenderCredential],
        subjects: &'a [String],
        sender_names: &'a [String],
    ) -> Self {
        Self {
            credentials,
            subjects,
            sender_names,
        }
    }

    #[must_use]
    pub fn for_request(request: &'a BatchRequest) -> Self {
        Self::new(
            &request.credentials,
            &request.subjects,
            &request.sender_names,
        )
    }

    /// The assignment for the target at `global_index`.
    #[must_use]
    pub fn select(&self, global_index: usize) -> Selection<'a> {
        let slot = global_index % self.credentials.len();
        Selection {
            credential: &self.credentials[slot],
            subject: &self.subjects[global_index % self.subjects.len()],
            sender_name: &self.sender_names[global_index % self.sender_names.len()],
            slot,
        }
    }
}
