//! Delivery transport capability seam.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::DeliveryError,
    types::{Attachment, SenderCredential},
};

/// A fully personalized message ready to leave through a transport handle.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Display name shown as the sender.
    pub from_name: String,

    /// Sender address; always the address of the credential the handle was
    /// opened with.
    pub from_address: String,

    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub attachments: Vec<Attachment>,
}

/// Receipt returned by a transport for an accepted message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub message_id: String,
}

/// A live, reusable transport handle bound to one sender credential.
///
/// Handles are expected to keep their connections alive across messages;
/// that reuse is the whole point of pooling them.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one message.
    ///
    /// # Errors
    ///
    /// Returns an error when the endpoint rejects the message or cannot be
    /// reached.
    async fn deliver(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, DeliveryError>;

    /// Check that the credential behind this handle authenticates.
    ///
    /// # Errors
    ///
    /// Returns an error describing why the credential is unusable.
    async fn verify(&self) -> Result<(), DeliveryError>;

    /// Tear the handle down, releasing its connections.
    async fn close(&self);
}

/// Builds transport handles from credentials.
///
/// Opening is synchronous: handles connect lazily on first use, so the pool
/// can construct them without holding an await point inside its map locks.
pub trait TransportFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns [`DeliveryError::Configuration`] when the credential cannot
    /// produce a handle at all.
    fn open(&self, credential: &SenderCredential) -> Result<Arc<dyn Transport>, DeliveryError>;
}
