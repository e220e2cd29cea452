//! EventSender trait - Dispatcher transport interface

use async_trait::async_trait;

use crate::{ContractError, Destination, IncomingEvent};

/// Delivery transport.
///
/// Any error is treated as a send failure for that destination. Per-send
/// timeouts are the responsibility of the implementation.
#[async_trait]
pub trait EventSender: Send + Sync {
    /// Sender name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one customized event
    ///
    /// # Errors
    /// `ContractError::Unretryable` for validation failures, any other
    /// variant for transport failures
    async fn send_event(
        &self,
        event: &IncomingEvent,
        destination: &Destination,
    ) -> Result<(), ContractError>;
}
