//! Broker-neutral view of incoming envelopes.
//!
//! `DeliveryHandle::settle` takes the handle by value, so every delivery is
//! acknowledged, requeued or discarded exactly once.

use async_trait::async_trait;

use crate::error::WorkerError;

/// Terminal queue-level decision for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed; remove from the queue.
    Ack,
    /// Not finished; put back for redelivery.
    Requeue,
    /// Unprocessable; drop without redelivery.
    Discard,
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Disposition::Ack => write!(f, "ack"),
            Disposition::Requeue => write!(f, "requeue"),
            Disposition::Discard => write!(f, "discard"),
        }
    }
}

#[async_trait]
pub trait DeliveryHandle: Send {
    async fn settle(self: Box<Self>, disposition: Disposition) -> Result<(), WorkerError>;
}

/// One envelope pulled from the queue.
pub struct Incoming {
    pub body: Vec<u8>,
    /// The broker has handed this envelope out before.
    pub redelivered: bool,
    pub handle: Box<dyn DeliveryHandle>,
}

impl std::fmt::Debug for Incoming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Incoming")
            .field("body_len", &self.body.len())
            .field("redelivered", &self.redelivered)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait EnvelopeSource: Send {
    /// Next envelope; `None` once the source is closed.
    async fn next(&mut self) -> Option<Result<Incoming, WorkerError>>;
}
