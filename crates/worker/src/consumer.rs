//! Consuming loop.
//!
//! A single loop pulls envelopes and dispatches each one to its own task, so
//! a long scheduled wait never holds up other messages. A semaphore sized to
//! the prefetch limit bounds how many units are in flight. On shutdown the
//! loop stops pulling, every in-flight unit requeues its envelope, and `run`
//! returns once all of them have settled.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::processor::Processor;
use crate::queue::{EnvelopeSource, Incoming};

/// Counters for one `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub received: u64,
    pub source_errors: u64,
    /// The source ended on its own rather than through shutdown.
    pub source_closed: bool,
}

pub struct Worker {
    processor: Arc<Processor>,
    max_in_flight: usize,
}

impl Worker {
    pub fn new(processor: Processor, max_in_flight: usize) -> Self {
        Self {
            processor: Arc::new(processor),
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Consume until the source closes or `shutdown` fires, then drain.
    pub async fn run<S: EnvelopeSource>(
        &self,
        mut source: S,
        shutdown: CancellationToken,
    ) -> RunStats {
        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks = JoinSet::new();
        let mut stats = RunStats::default();

        tracing::info!(
            max_in_flight = self.max_in_flight,
            max_attempts = self.processor.policy().max_attempts(),
            "Worker started, waiting for messages"
        );

        loop {
            // Take the slot first so we never hold an envelope we cannot start.
            let permit = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = source.next() => next,
            };

            let incoming = match next {
                Some(Ok(incoming)) => incoming,
                Some(Err(e)) => {
                    stats.source_errors += 1;
                    tracing::warn!(error = %e, "Failed to receive envelope");
                    continue;
                }
                None => {
                    tracing::warn!("Queue consumer closed by the broker");
                    stats.source_closed = true;
                    break;
                }
            };

            stats.received += 1;
            let processor = self.processor.clone();
            let token = shutdown.clone();
            tasks.spawn(async move {
                let _permit = permit;
                handle(&processor, incoming, &token).await;
            });

            while let Some(result) = tasks.try_join_next() {
                log_join(result);
            }
        }

        if !tasks.is_empty() {
            tracing::info!(in_flight = tasks.len(), "Waiting for in-flight messages to settle");
        }
        while let Some(result) = tasks.join_next().await {
            log_join(result);
        }

        tracing::info!(
            received = stats.received,
            source_errors = stats.source_errors,
            "Worker stopped"
        );
        stats
    }
}

async fn handle(processor: &Processor, incoming: Incoming, shutdown: &CancellationToken) {
    let Incoming {
        body,
        redelivered,
        handle,
    } = incoming;

    if redelivered {
        tracing::debug!("Processing redelivered envelope");
    }

    let disposition = processor.process(&body, shutdown).await;

    if let Err(e) = handle.settle(disposition).await {
        tracing::error!(disposition = %disposition, error = %e, "Failed to settle delivery");
    }
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "Message task aborted");
    }
}
