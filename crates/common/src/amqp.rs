//! RabbitMQ connection and queue topology shared by producer and worker.

use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, ExchangeKind};

pub const EXCHANGE_NAME: &str = "notifications.exchange";
pub const QUEUE_NAME: &str = "notifications.queue";
pub const ROUTING_KEY: &str = "notifications.create";
pub const CONSUMER_TAG: &str = "delayed_notifier_worker";

/// Header identifying the publishing service.
pub const SERVICE_HEADER: &str = "x-service";
pub const SERVICE_NAME: &str = "delayed-notifier";

/// Open a connection to the broker.
pub async fn connect(rabbit_url: &str, connection_name: &str) -> anyhow::Result<Connection> {
    let props = ConnectionProperties::default().with_connection_name(connection_name.into());
    let conn = Connection::connect(rabbit_url, props).await?;

    tracing::info!(connection_name, "Connected to RabbitMQ");
    Ok(conn)
}

/// Declare the durable direct exchange and queue and bind them.
///
/// Declarations are idempotent, so both the producer and the worker call this.
pub async fn declare_topology(channel: &Channel) -> Result<(), lapin::Error> {
    channel
        .exchange_declare(
            EXCHANGE_NAME,
            ExchangeKind::Direct,
            ExchangeDeclareOptions {
                durable: true,
                ..ExchangeDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await?;

    channel
        .queue_declare(
            QUEUE_NAME,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await?;

    channel
        .queue_bind(
            QUEUE_NAME,
            EXCHANGE_NAME,
            ROUTING_KEY,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    tracing::debug!(
        exchange = EXCHANGE_NAME,
        queue = QUEUE_NAME,
        routing_key = ROUTING_KEY,
        "Queue topology declared"
    );
    Ok(())
}
