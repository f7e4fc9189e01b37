//! Credential verification: the non-batched variant of the pool and
//! scheduler machinery.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    pool::ClientPool, scheduler, transport::TransportFactory, types::SenderCredential,
};

/// Validity of one checked credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyStatus {
    Valid,
    Invalid { reason: String },
}

/// Outcome for one credential, identity carried alongside so completion
/// order doesn't matter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOutcome {
    /// The login user the check ran as.
    pub account: String,

    #[serde(flatten)]
    pub status: VerifyStatus,
}

impl VerifyOutcome {
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self.status, VerifyStatus::Valid)
    }
}

/// Check every credential independently, with at most `limit` handshakes in
/// flight at once.
///
/// Handles are transient: built outside the pool and closed immediately
/// after the check whatever its outcome, so repeated one-off verification
/// cannot accumulate connections. One invalid credential never stops the
/// others from being checked.
pub async fn verify_credentials(
    factory: Arc<dyn TransportFactory>,
    credentials: Vec<SenderCredential>,
    limit: usize,
) -> Vec<VerifyOutcome> {
    let pool = Arc::new(ClientPool::new(factory));

    scheduler::run_bounded(credentials, limit, move |credential| {
        let pool = Arc::clone(&pool);
        async move { check_one(&pool, &credential).await }
    })
    .await
}

async fn check_one(pool: &ClientPool, credential: &SenderCredential) -> VerifyOutcome {
    let account = credential.login_user().to_owned();

    let transport = match pool.transient(credential) {
        Ok(transport) => transport,
        Err(error) => {
            return VerifyOutcome {
                account,
                status: VerifyStatus::Invalid {
                    reason: error.to_string(),
                },
            };
        }
    };

    let status = match transport.verify().await {
        Ok(()) => VerifyStatus::Valid,
        Err(error) => VerifyStatus::Invalid {
            reason: error.to_string(),
        },
    };
    transport.close().await;

    debug!(account = %account, valid = matches!(status, VerifyStatus::Valid), "Credential checked");
    VerifyOutcome { account, status }
}
