//! HttpSender - POSTs the customized event to the destination callback

use std::time::Duration;

use async_trait::async_trait;
use contracts::{ContractError, Destination, EventSender, IncomingEvent};
use tracing::{debug, instrument};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Webhook transport
#[derive(Debug, Clone)]
pub struct HttpSender {
    client: reqwest::Client,
}

impl HttpSender {
    pub fn new() -> Result<Self, ContractError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ContractError::transport("http", format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventSender for HttpSender {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(
        name = "http_sender_send",
        skip(self, event, destination),
        fields(destination = %destination.name())
    )]
    async fn send_event(
        &self,
        event: &IncomingEvent,
        destination: &Destination,
    ) -> Result<(), ContractError> {
        let url = destination.callback_url();
        if url.is_empty() {
            return Err(ContractError::unretryable(format!(
                "callback url of {} is empty",
                destination.name()
            )));
        }

        let response = self
            .client
            .post(&url)
            .json(event)
            .send()
            .await
            .map_err(|e| ContractError::transport("http", format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ContractError::transport(
                "http",
                format!("{url} responded {status}: {body}"),
            ));
        }

        debug!(url = %url, status = %status, "Callback accepted");
        Ok(())
    }
}
