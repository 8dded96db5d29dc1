//! Outbound delivery contract used by the relay.

use async_trait::async_trait;

use crate::types::{OutboundId, Payload, PayloadKind, UserId};

/// Delivery failure reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The recipient's settings forbid this payload kind (e.g. voice messages).
    #[error("recipient does not accept {0} messages")]
    KindForbidden(PayloadKind),

    /// Any other delivery failure.
    #[error("delivery failed: {0}")]
    Other(String),
}

/// Sends payloads to the operator inbox and to end-users.
///
/// Retries, if any, are the transport's business; the relay never retries.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Emit `payload` into the operator chat, returning the id of the new message.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] if the message could not be delivered.
    async fn send_to_operator(&self, payload: &Payload) -> Result<OutboundId, DeliveryError>;

    /// Emit `payload` into the chat of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] if the message could not be delivered.
    async fn send_to_user(&self, user_id: UserId, payload: &Payload) -> Result<(), DeliveryError>;
}
