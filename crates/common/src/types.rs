use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Delivery status of a scheduled notification.
///
/// `Failed` marks a single failed attempt and is never written to the store;
/// only the outcome of the whole attempt sequence is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
pub enum MessageStatus {
    Scheduled,
    Sent,
    Failed,
    #[serde(rename = "Terminally_Failed")]
    #[sqlx(rename = "Terminally_Failed")]
    TerminallyFailed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Scheduled => "Scheduled",
            MessageStatus::Sent => "Sent",
            MessageStatus::Failed => "Failed",
            MessageStatus::TerminallyFailed => "Terminally_Failed",
        }
    }

    /// `Sent` and `TerminallyFailed` end the lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Sent | MessageStatus::TerminallyFailed)
    }

    /// Statuses that may appear in the store.
    pub fn is_persistable(&self) -> bool {
        !matches!(self, MessageStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a legal step of the lifecycle.
    ///
    /// Nothing leaves a terminal state and nothing re-enters `Scheduled`.
    pub fn can_transition_to(&self, next: MessageStatus) -> bool {
        use MessageStatus::*;
        matches!(
            (self, next),
            (Scheduled | Failed, Sent | TerminallyFailed | Failed)
        )
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Scheduled" => Ok(MessageStatus::Scheduled),
            "Sent" => Ok(MessageStatus::Sent),
            "Failed" => Ok(MessageStatus::Failed),
            "Terminally_Failed" => Ok(MessageStatus::TerminallyFailed),
            other => Err(AppError::Decode(format!("unknown message status '{}'", other))),
        }
    }
}

/// A scheduled notification.
///
/// This is also the queue envelope: the producer publishes the JSON form of
/// the record it just persisted, and the worker trusts `scheduled_at` from
/// the envelope rather than re-reading the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub status: MessageStatus,
    pub scheduled_at: DateTime<Utc>,
    pub user_id: u32,
    pub telegram_chat_id: u32,
}

impl Message {
    /// Check the fields the producer is responsible for.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.user_id == 0 {
            return Err(AppError::Validation(
                "user_id should be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything the caller supplies when scheduling a notification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateNotification {
    pub text: String,
    pub scheduled_at: DateTime<Utc>,
    pub user_id: u32,
    pub telegram_chat_id: u32,
}

impl CreateNotification {
    /// Turn the request into a fresh `Scheduled` message with a new id.
    pub fn into_message(self) -> Message {
        Message {
            id: Uuid::new_v4(),
            text: self.text,
            status: MessageStatus::Scheduled,
            scheduled_at: self.scheduled_at,
            user_id: self.user_id,
            telegram_chat_id: self.telegram_chat_id,
        }
    }
}
