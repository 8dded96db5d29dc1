//! Relay between admitted users and the single operator inbox.
//!
//! [`RelayCorrelator::forward`] emits an admitted user's message to the
//! operator and remembers which user each operator-facing message came from.
//! [`RelayCorrelator::route_reply`] uses that memory to deliver an operator
//! reply back to the right user.

pub mod correlation;
pub mod spam;
pub mod transport;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::history::MessageLog;
use crate::types::{InboundMessage, OutboundId, Payload, Sender, UserId};

use self::correlation::CorrelationTable;
use self::spam::AdFilter;
use self::transport::{DeliveryError, Transport};

/// Why a user message was not relayed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForwardError {
    /// The advertisement heuristic matched.
    #[error("message blocked as advertisement")]
    Blocked,

    /// The message kind cannot be relayed.
    #[error("unsupported message type")]
    UnsupportedType,

    /// The operator could not be reached.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Why an operator message could not be routed back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplyError {
    /// The operator message is not a reply to anything.
    #[error("message is not a reply to a relayed message")]
    NoReplyTarget,

    /// The replied-to message is not (or no longer) tracked.
    #[error("no origin user known for message {0}")]
    UnknownOrigin(OutboundId),

    /// The reply kind cannot be relayed.
    #[error("unsupported reply type")]
    UnsupportedType,

    /// The user could not be reached.
    #[error("reply delivery failed: {0}")]
    DeliveryFailed(DeliveryError),
}

/// Forwards admitted messages and routes operator replies.
pub struct RelayCorrelator {
    transport: Arc<dyn Transport>,
    log: Arc<dyn MessageLog>,
    clock: Arc<dyn Clock>,
    filter: AdFilter,
    table: CorrelationTable,
}

impl std::fmt::Debug for RelayCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayCorrelator")
            .field("tracked", &self.table.len())
            .finish_non_exhaustive()
    }
}

impl RelayCorrelator {
    /// Create a relay with an empty correlation table.
    pub fn new(
        transport: Arc<dyn Transport>,
        log: Arc<dyn MessageLog>,
        clock: Arc<dyn Clock>,
        filter: AdFilter,
        table: CorrelationTable,
    ) -> Self {
        Self {
            transport,
            log,
            clock,
            filter,
            table,
        }
    }

    /// Number of tracked operator-facing messages.
    pub fn tracked(&self) -> usize {
        self.table.len()
    }

    /// Forward an admitted message from `user_id` to the operator.
    ///
    /// The caller must already hold an `Admit` decision for this message.
    /// Returns the id of the operator-facing message carrying the payload.
    ///
    /// # Errors
    ///
    /// - [`ForwardError::Blocked`] if the advertisement heuristic matches.
    /// - [`ForwardError::UnsupportedType`] if the message has no relayable payload.
    /// - [`ForwardError::Delivery`] if the operator chat rejects the payload.
    ///
    /// Nothing is emitted or recorded in the first two cases.
    pub async fn forward(
        &self,
        user_id: UserId,
        message: &InboundMessage,
    ) -> Result<OutboundId, ForwardError> {
        if self.filter.is_advertisement(message) {
            info!(user_id, "message blocked by advertisement filter");
            return Err(ForwardError::Blocked);
        }

        let Some(payload) = message.payload.as_ref() else {
            debug!(user_id, "unsupported message type, not relayed");
            return Err(ForwardError::UnsupportedType);
        };

        let header = operator_header(user_id, &message.sender);
        let (captioned, note) = payload.with_header(&header);

        let outbound = self.transport.send_to_operator(&captioned).await?;
        self.table.insert(outbound, user_id);
        debug!(user_id, %outbound, kind = %payload.kind(), "message forwarded to operator");

        if let Some(text) = note {
            match self.transport.send_to_operator(&Payload::Text { text }).await {
                Ok(note_id) => self.table.insert(note_id, user_id),
                Err(e) => warn!(user_id, error = %e, "failed to send operator header note"),
            }
        }

        self.record_history(user_id, payload).await;
        Ok(outbound)
    }

    /// Route an operator reply to the user who sent `replied_to`.
    ///
    /// # Errors
    ///
    /// - [`ReplyError::NoReplyTarget`] if `replied_to` is `None`.
    /// - [`ReplyError::UnknownOrigin`] if the id is not tracked.
    /// - [`ReplyError::UnsupportedType`] if the reply has no relayable payload.
    /// - [`ReplyError::DeliveryFailed`] if the user could not be reached.
    pub async fn route_reply(
        &self,
        replied_to: Option<OutboundId>,
        reply: &InboundMessage,
    ) -> Result<(), ReplyError> {
        let outbound = replied_to.ok_or(ReplyError::NoReplyTarget)?;
        let user_id = self
            .table
            .lookup(outbound)
            .ok_or(ReplyError::UnknownOrigin(outbound))?;
        let payload = reply.payload.as_ref().ok_or(ReplyError::UnsupportedType)?;

        self.transport
            .send_to_user(user_id, payload)
            .await
            .map_err(ReplyError::DeliveryFailed)?;

        debug!(user_id, %outbound, kind = %payload.kind(), "operator reply delivered");
        Ok(())
    }

    async fn record_history(&self, user_id: UserId, payload: &Payload) {
        let at = match self.clock.now() {
            Ok(at) => at,
            Err(e) => {
                warn!(user_id, error = %e, "skipping history entry, clock unavailable");
                return;
            }
        };
        if let Err(e) = self.log.record(user_id, &payload.summary(), at).await {
            warn!(user_id, error = %e, "failed to record history entry");
        }
    }
}

/// Header placed in front of every relayed message.
pub fn operator_header(user_id: UserId, sender: &Sender) -> String {
    format!("{} (ID: {user_id}) sent:\n", sender.display_name())
}
