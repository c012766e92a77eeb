//! Bounded-retry delivery of a single message.
//!
//! Attempts run one after another. The first success ends the sequence; when
//! every attempt has failed the message is exhausted. Shutdown during a
//! backoff wait abandons the sequence without an outcome.

use tokio_util::sync::CancellationToken;

use notifier_common::types::{Message, MessageStatus};

use crate::action::DeliveryAction;
use crate::delay::sleep_or_cancel;
use crate::error::{DeliveryError, Interrupted};
use crate::retry::RetryPolicy;

/// Final result of an attempt sequence.
#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    Sent { attempts: u32 },
    Exhausted { attempts: u32, last_error: DeliveryError },
}

impl DeliveryOutcome {
    /// Status to persist for this outcome.
    pub fn status(&self) -> MessageStatus {
        match self {
            DeliveryOutcome::Sent { .. } => MessageStatus::Sent,
            DeliveryOutcome::Exhausted { .. } => MessageStatus::TerminallyFailed,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Sent { attempts } | DeliveryOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }
}

pub async fn deliver_with_retry(
    action: &dyn DeliveryAction,
    policy: &RetryPolicy,
    message: &Message,
    shutdown: &CancellationToken,
) -> Result<DeliveryOutcome, Interrupted> {
    let mut last_error = DeliveryError::new("no attempt made");

    for attempt in 1..=policy.max_attempts() {
        if let Some(delay) = policy.delay_before(attempt) {
            tracing::debug!(
                message_id = %message.id,
                attempt,
                delay_secs = delay.as_secs_f64(),
                "Waiting before retry"
            );
            sleep_or_cancel(delay, shutdown).await?;
        }

        match action.deliver(message).await {
            Ok(()) => {
                if attempt > 1 {
                    tracing::info!(message_id = %message.id, attempt, "Delivery succeeded after retry");
                }
                return Ok(DeliveryOutcome::Sent { attempts: attempt });
            }
            Err(e) => {
                tracing::warn!(
                    message_id = %message.id,
                    attempt,
                    max_attempts = policy.max_attempts(),
                    status = %MessageStatus::Failed,
                    error = %e,
                    "Delivery attempt failed"
                );
                last_error = e;
            }
        }
    }

    Ok(DeliveryOutcome::Exhausted {
        attempts: policy.max_attempts(),
        last_error,
    })
}
