//! Delayed-delivery worker.
//!
//! Consumes notification envelopes, holds each one until its scheduled time,
//! delivers it with bounded retries and records the terminal status in the
//! store and the status cache.

pub mod action;
pub mod amqp;
pub mod clock;
pub mod consumer;
pub mod delay;
pub mod delivery;
pub mod error;
pub mod processor;
pub mod queue;
pub mod retry;
