//! Terminal delivery actions.
//!
//! An action is what "sending" a notification means. The retry loop only
//! looks at whether it succeeded.

use std::time::Duration;

use async_trait::async_trait;

use notifier_common::types::Message;

use crate::error::DeliveryError;

#[async_trait]
pub trait DeliveryAction: Send + Sync {
    async fn deliver(&self, message: &Message) -> Result<(), DeliveryError>;
}

/// Records the delivery in the log and always succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAction;

#[async_trait]
impl DeliveryAction for LogAction {
    async fn deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        tracing::info!(
            message_id = %message.id,
            user_id = message.user_id,
            telegram_chat_id = message.telegram_chat_id,
            "Notification delivered"
        );
        Ok(())
    }
}

/// POSTs the envelope JSON to a webhook; any non-2xx answer is a failure.
#[derive(Debug, Clone)]
pub struct WebhookAction {
    client: reqwest::Client,
    url: String,
}

impl WebhookAction {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl DeliveryAction for WebhookAction {
    async fn deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        let response = self.client.post(&self.url).json(message).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::new(format!(
                "webhook answered {}",
                status
            )));
        }
        Ok(())
    }
}
