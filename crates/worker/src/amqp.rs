//! RabbitMQ adapter for the worker's queue traits.

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, BasicRejectOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Consumer};

use notifier_common::amqp::{CONSUMER_TAG, QUEUE_NAME, declare_topology};

use crate::error::WorkerError;
use crate::queue::{DeliveryHandle, Disposition, EnvelopeSource, Incoming};

/// Envelopes from `notifications.queue` with manual acknowledgement.
pub struct AmqpSource {
    consumer: Consumer,
}

impl AmqpSource {
    /// Declare the topology, cap unacknowledged deliveries at `prefetch` and
    /// start consuming.
    pub async fn start(channel: &Channel, prefetch: u16) -> Result<Self, WorkerError> {
        declare_topology(channel).await?;
        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await?;

        let consumer = channel
            .basic_consume(
                QUEUE_NAME,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        tracing::info!(queue = QUEUE_NAME, prefetch, "Consuming notifications");
        Ok(Self { consumer })
    }
}

#[async_trait]
impl EnvelopeSource for AmqpSource {
    async fn next(&mut self) -> Option<Result<Incoming, WorkerError>> {
        let delivery = match self.consumer.next().await? {
            Ok(delivery) => delivery,
            Err(e) => return Some(Err(e.into())),
        };

        Some(Ok(Incoming {
            body: delivery.data,
            redelivered: delivery.redelivered,
            handle: Box::new(AmqpHandle {
                acker: delivery.acker,
            }),
        }))
    }
}

struct AmqpHandle {
    acker: Acker,
}

#[async_trait]
impl DeliveryHandle for AmqpHandle {
    async fn settle(self: Box<Self>, disposition: Disposition) -> Result<(), WorkerError> {
        match disposition {
            Disposition::Ack => self.acker.ack(BasicAckOptions::default()).await?,
            Disposition::Requeue => {
                self.acker
                    .nack(BasicNackOptions {
                        multiple: false,
                        requeue: true,
                    })
                    .await?
            }
            Disposition::Discard => {
                self.acker
                    .reject(BasicRejectOptions { requeue: false })
                    .await?
            }
        }
        Ok(())
    }
}
