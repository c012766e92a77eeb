//! Per-envelope processing: decode, wait for the scheduled time, deliver with
//! retries, persist the outcome and decide the queue disposition.
//!
//! Disposition rules:
//! - malformed or invalid envelope → `Discard` (poison message)
//! - terminal outcome reached (sent or exhausted) → `Ack`
//! - already terminal or deleted record → `Ack` without delivering
//! - shutdown before an outcome → `Requeue`, nothing persisted

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use notifier_common::cache::StatusCache;
use notifier_common::error::AppError;
use notifier_common::store::MessageStore;
use notifier_common::types::Message;

use crate::action::DeliveryAction;
use crate::clock::Clock;
use crate::delay::wait_until;
use crate::delivery::{DeliveryOutcome, deliver_with_retry};
use crate::queue::Disposition;
use crate::retry::RetryPolicy;

/// Whether a message still needs delivering, according to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Deliver,
    Skip,
}

pub struct Processor {
    store: Arc<dyn MessageStore>,
    cache: Option<Arc<dyn StatusCache>>,
    action: Arc<dyn DeliveryAction>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    cache_ttl: Duration,
}

impl Processor {
    pub fn new(
        store: Arc<dyn MessageStore>,
        cache: Option<Arc<dyn StatusCache>>,
        action: Arc<dyn DeliveryAction>,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            action,
            policy,
            clock,
            cache_ttl,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run one envelope to its disposition.
    pub async fn process(&self, body: &[u8], shutdown: &CancellationToken) -> Disposition {
        let message = match decode(body) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    body_len = body.len(),
                    "Discarding poison envelope"
                );
                return Disposition::Discard;
            }
        };

        if self.check_pending(&message).await == Pending::Skip {
            return Disposition::Ack;
        }

        let waited = match wait_until(message.scheduled_at, self.clock.as_ref(), shutdown).await {
            Ok(waited) => waited,
            Err(_) => {
                tracing::info!(message_id = %message.id, "Shutdown during scheduled wait, requeueing");
                return Disposition::Requeue;
            }
        };

        // The record may have been deleted while we were waiting.
        if !waited.is_zero() && self.check_pending(&message).await == Pending::Skip {
            return Disposition::Ack;
        }

        let outcome = match deliver_with_retry(
            self.action.as_ref(),
            &self.policy,
            &message,
            shutdown,
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::info!(message_id = %message.id, "Shutdown during retry backoff, requeueing");
                return Disposition::Requeue;
            }
        };

        match &outcome {
            DeliveryOutcome::Sent { attempts } => {
                tracing::info!(message_id = %message.id, attempts, "Message sent");
            }
            DeliveryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                tracing::error!(
                    message_id = %message.id,
                    attempts,
                    error = %last_error,
                    "Delivery failed after all retries"
                );
            }
        }

        self.sync_status(&message, &outcome).await;
        Disposition::Ack
    }

    /// Detect duplicates of finished messages and records deleted by the API.
    async fn check_pending(&self, message: &Message) -> Pending {
        match self.store.get_status(message.id).await {
            Ok(status) if status.is_terminal() => {
                tracing::debug!(
                    message_id = %message.id,
                    status = %status,
                    "Message already terminal, acknowledging duplicate"
                );
                Pending::Skip
            }
            Ok(_) => Pending::Deliver,
            Err(AppError::NotFound(_)) => {
                tracing::info!(message_id = %message.id, "Message deleted, skipping delivery");
                Pending::Skip
            }
            Err(e) => {
                // Store outage: keep going, the update guard still protects terminal rows.
                tracing::warn!(message_id = %message.id, error = %e, "Status pre-check failed");
                Pending::Deliver
            }
        }
    }

    /// Persist the outcome, then refresh the cache. Neither failure is fatal.
    async fn sync_status(&self, message: &Message, outcome: &DeliveryOutcome) {
        let status = outcome.status();

        let refresh_cache = match self.store.update_status(message.id, status).await {
            Ok(()) => true,
            Err(AppError::NotFound(_)) => {
                tracing::info!(
                    message_id = %message.id,
                    status = %status,
                    "Message deleted during delivery, outcome not stored"
                );
                false
            }
            Err(AppError::Conflict(reason)) => {
                tracing::warn!(message_id = %message.id, reason = %reason, "Outcome not stored");
                false
            }
            Err(e) => {
                tracing::error!(
                    message_id = %message.id,
                    status = %status,
                    error = %e,
                    "Failed to persist delivery outcome"
                );
                true
            }
        };

        if refresh_cache
            && let Some(cache) = &self.cache
            && let Err(e) = cache.set_status(message.id, status, self.cache_ttl).await
        {
            tracing::debug!(message_id = %message.id, error = %e, "Status cache refresh failed");
        }
    }
}

/// Parse and validate an envelope.
pub fn decode(body: &[u8]) -> Result<Message, AppError> {
    let message: Message = serde_json::from_slice(body)
        .map_err(|e| AppError::Decode(format!("invalid envelope: {}", e)))?;
    message.validate()?;
    Ok(message)
}
