//! Envelope publisher: hands persisted messages to the broker.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection};

use notifier_common::amqp::{
    EXCHANGE_NAME, ROUTING_KEY, SERVICE_HEADER, SERVICE_NAME, declare_topology,
};
use notifier_common::error::AppError;
use notifier_common::types::Message;

/// AMQP persistent delivery mode.
const PERSISTENT: u8 = 2;

#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    /// Publish the envelope for an already persisted message.
    async fn publish(&self, message: &Message) -> Result<(), AppError>;
}

/// Publishes envelopes to the notifications exchange with publisher confirms.
#[derive(Clone)]
pub struct AmqpPublisher {
    channel: Channel,
    expiration: Duration,
}

impl AmqpPublisher {
    /// Open a confirm-mode channel on `conn` and make sure the topology exists.
    pub async fn new(conn: &Connection, expiration: Duration) -> Result<Self, AppError> {
        let channel = conn.create_channel().await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;
        declare_topology(&channel).await?;

        Ok(Self {
            channel,
            expiration,
        })
    }

    fn properties(&self, message: &Message) -> BasicProperties {
        let ttl = envelope_ttl(message.scheduled_at, Utc::now(), self.expiration);
        let mut headers = FieldTable::default();
        headers.insert(
            SERVICE_HEADER.into(),
            AMQPValue::LongString(SERVICE_NAME.into()),
        );

        BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(PERSISTENT)
            .with_expiration(expiration_hint(ttl).into())
            .with_headers(headers)
    }
}

/// How long the broker may hold an envelope: until it is due, plus `grace`.
///
/// The broker keeps the original expiry across requeues, so it has to outlast
/// the scheduled wait.
pub fn envelope_ttl(
    scheduled_at: DateTime<Utc>,
    now: DateTime<Utc>,
    grace: Duration,
) -> Duration {
    (scheduled_at - now).to_std().unwrap_or(Duration::ZERO) + grace
}

/// Per-message expiration is expressed in milliseconds as a string.
pub fn expiration_hint(ttl: Duration) -> String {
    ttl.as_millis().to_string()
}

#[async_trait]
impl NotificationPublisher for AmqpPublisher {
    async fn publish(&self, message: &Message) -> Result<(), AppError> {
        let body = serde_json::to_vec(message)
            .map_err(|e| AppError::Internal(format!("Failed to encode envelope: {}", e)))?;

        let confirmation = self
            .channel
            .basic_publish(
                EXCHANGE_NAME,
                ROUTING_KEY,
                BasicPublishOptions::default(),
                &body,
                self.properties(message),
            )
            .await?
            .await?;

        if confirmation.is_nack() {
            tracing::warn!(message_id = %message.id, "Broker rejected envelope");
            return Err(AppError::Internal(format!(
                "Broker did not confirm message {}",
                message.id
            )));
        }

        tracing::debug!(
            message_id = %message.id,
            scheduled_at = %message.scheduled_at,
            "Envelope published"
        );
        Ok(())
    }
}
