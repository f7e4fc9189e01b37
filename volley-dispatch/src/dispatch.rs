//! The dispatch unit: end-to-end handling of one target.

use chrono::Utc;
use tracing::warn;
use volley_common::outbound;

use crate::{
    error::DispatchError,
    personalize::Personalizer,
    pool::ClientPool,
    progress::ProgressReporter,
    rotation::{RotationSelector, Selection},
    transport::{DeliveryReceipt, OutboundMessage},
    types::{BatchRequest, DispatchResult, GenerationSpec, Outcome, Target},
};

/// Executes dispatch units against the process-scoped pool and
/// personalization caches.
pub struct Dispatcher {
    pool: ClientPool,
    personalizer: Personalizer,
}

impl Dispatcher {
    #[must_use]
    pub const fn new(pool: ClientPool, personalizer: Personalizer) -> Self {
        Self { pool, personalizer }
    }

    #[must_use]
    pub const fn pool(&self) -> &ClientPool {
        &self.pool
    }

    #[must_use]
    pub const fn personalizer(&self) -> &Personalizer {
        &self.personalizer
    }

    /// Handle one target: select, personalize, acquire, deliver.
    ///
    /// Infallible: every error, whether from personalization or delivery,
    /// is classified into a `Failed` outcome right here and never rethrown,
    /// so one bad target cannot take the batch down with it.
    pub async fn dispatch_one(
        &self,
        target: &Target,
        global_index: usize,
        request: &BatchRequest,
        reporter: &ProgressReporter,
    ) -> DispatchResult {
        let selection = RotationSelector::for_request(request).select(global_index);
        let slot = selection.slot;

        let outcome = match self
            .try_dispatch(target, selection, &request.generation)
            .await
        {
            Ok(receipt) => Outcome::Sent {
                message_id: receipt.message_id,
            },
            Err(error) => {
                warn!(
                    email = %target.email,
                    index = global_index,
                    kind = ?error.kind(),
                    error = %error,
                    "Dispatch unit failed"
                );
                Outcome::Failed {
                    kind: error.kind(),
                    detail: error.to_string(),
                }
            }
        };

        let result = DispatchResult {
            email: target.email.clone(),
            outcome,
            completed_at_ms: Utc::now().timestamp_millis(),
        };
        reporter.record(&result, slot);
        result
    }

    async fn try_dispatch(
        &self,
        target: &Target,
        selection: Selection<'_>,
        generation: &GenerationSpec,
    ) -> Result<DeliveryReceipt, DispatchError> {
        let personalized = self
            .personalizer
            .personalize(target, selection.subject, generation)
            .await?;

        let transport = self.pool.acquire(selection.credential)?;

        let message = OutboundMessage {
            from_name: selection.sender_name.to_owned(),
            from_address: selection.credential.email.clone(),
            to: target.email.clone(),
            subject: personalized.subject,
            text_body: personalized.text_body,
            html_body: personalized.html_body,
            attachments: personalized.attachments,
        };

        outbound!(level = DEBUG, "{} -> {}", message.from_address, message.to);
        let receipt = transport.deliver(&message).await?;
        Ok(receipt)
    }
}
