//! Transport handle pooling.
//!
//! Reconnecting and re-authenticating per message would dominate a large
//! run; the pool keeps one live handle per sender identity and hands out
//! clones of it for the lifetime of the process.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::{
    error::DeliveryError,
    transport::{Transport, TransportFactory},
    types::{PoolKey, SenderCredential},
};

/// One live transport handle per (account, endpoint) key.
///
/// Handles are created lazily on first use and never evicted during a run;
/// [`ClientPool::shutdown`] tears everything down at end of life.
pub struct ClientPool {
    factory: Arc<dyn TransportFactory>,
    clients: DashMap<PoolKey, Arc<dyn Transport>, ahash::RandomState>,
}

impl ClientPool {
    #[must_use]
    pub fn new(factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            factory,
            clients: DashMap::default(),
        }
    }

    /// The cached handle for `credential`, created on first use.
    ///
    /// First use for a key runs inside the entry lock: concurrent dispatch
    /// units racing on a fresh key construct exactly one handle. Later
    /// calls are lock-free reads.
    ///
    /// # Errors
    ///
    /// Returns an error when the factory rejects the credential.
    pub fn acquire(
        &self,
        credential: &SenderCredential,
    ) -> Result<Arc<dyn Transport>, DeliveryError> {
        let key = credential.pool_key();
        if let Some(client) = self.clients.get(&key) {
            return Ok(Arc::clone(&client));
        }

        debug!(account = %key.account, endpoint = %key.endpoint, "Opening transport handle");
        let entry = self
            .clients
            .entry(key)
            .or_try_insert_with(|| self.factory.open(credential))?;
        let client = Arc::clone(&entry);
        drop(entry);

        Ok(client)
    }

    /// An unpooled handle for one-off use.
    ///
    /// Nothing is cached: the caller owns the handle and must
    /// [`Transport::close`] it when done, so repeated one-off checks cannot
    /// accumulate connections.
    ///
    /// # Errors
    ///
    /// Returns an error when the factory rejects the credential.
    pub fn transient(
        &self,
        credential: &SenderCredential,
    ) -> Result<Arc<dyn Transport>, DeliveryError> {
        self.factory.open(credential)
    }

    /// Number of live pooled handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Close every pooled handle and drop it.
    pub async fn shutdown(&self) {
        let keys: Vec<PoolKey> = self.clients.iter().map(|entry| entry.key().clone()).collect();
        for key in keys {
            if let Some((_, client)) = self.clients.remove(&key) {
                client.close().await;
            }
        }
    }
}
