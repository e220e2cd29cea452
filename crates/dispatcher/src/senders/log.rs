//! LogSender - logs event summaries via tracing

use async_trait::async_trait;
use contracts::{ContractError, Destination, EventSender, IncomingEvent};
use tracing::{info, instrument};

/// Sender that logs deliveries instead of transmitting them
pub struct LogSender {
    name: String,
}

impl LogSender {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl EventSender for LogSender {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sender_send",
        skip(self, event, destination),
        fields(sender = %self.name, destination = %destination.name())
    )]
    async fn send_event(
        &self,
        event: &IncomingEvent,
        destination: &Destination,
    ) -> Result<(), ContractError> {
        info!(
            event = %event.trace_info(),
            payload_fields = event.payload.len(),
            has_document = event.target_document.is_some(),
            "Event delivered"
        );
        Ok(())
    }
}
