//! Durable message store.
//!
//! The store is the source of truth for a message's status. The producer
//! creates records; the worker only ever moves a record out of `Scheduled`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::types::{Message, MessageStatus};

/// Narrow read/write contract over the message table.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert a new record. The message must be `Scheduled`.
    async fn create(&self, message: &Message) -> Result<(), AppError>;

    /// Current persisted status, or `NotFound`.
    async fn get_status(&self, id: Uuid) -> Result<MessageStatus, AppError>;

    /// All messages, newest first.
    async fn list(&self) -> Result<Vec<Message>, AppError>;

    /// Move a `Scheduled` record to a terminal status.
    ///
    /// Returns `NotFound` when the record is gone, `Ok` when it already holds
    /// `status`, and `Conflict` when it holds a different terminal status.
    async fn update_status(&self, id: Uuid, status: MessageStatus) -> Result<(), AppError>;

    /// Remove a record. Returns `false` when nothing was deleted.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

/// Decide the result of an update that touched no rows, given what the
/// record holds now.
pub(crate) fn resolve_noop_update(
    id: Uuid,
    current: Option<MessageStatus>,
    requested: MessageStatus,
) -> Result<(), AppError> {
    match current {
        None => Err(AppError::NotFound(format!("Message {} not found", id))),
        Some(status) if status == requested => Ok(()),
        Some(status) => Err(AppError::Conflict(format!(
            "Message {} is {}, cannot move to {}",
            id, status, requested
        ))),
    }
}

pub(crate) fn check_update_target(status: MessageStatus) -> Result<(), AppError> {
    if !status.is_persistable() || !MessageStatus::Scheduled.can_transition_to(status) {
        return Err(AppError::Validation(format!(
            "{} is not a persistable outcome",
            status
        )));
    }
    Ok(())
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    text: String,
    status: MessageStatus,
    scheduled_at: DateTime<Utc>,
    user_id: i64,
    telegram_chat_id: i64,
}

impl TryFrom<MessageRow> for Message {
    type Error = AppError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            id: row.id,
            text: row.text,
            status: row.status,
            scheduled_at: row.scheduled_at,
            user_id: u32::try_from(row.user_id)
                .map_err(|_| AppError::Decode(format!("user_id out of range: {}", row.user_id)))?,
            telegram_chat_id: u32::try_from(row.telegram_chat_id).map_err(|_| {
                AppError::Decode(format!(
                    "telegram_chat_id out of range: {}",
                    row.telegram_chat_id
                ))
            })?,
        })
    }
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_status(&self, id: Uuid) -> Result<Option<MessageStatus>, AppError> {
        let status: Option<(MessageStatus,)> =
            sqlx::query_as("SELECT status FROM messages WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(status.map(|(s,)| s))
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn create(&self, message: &Message) -> Result<(), AppError> {
        if message.status != MessageStatus::Scheduled {
            return Err(AppError::Validation(format!(
                "new messages must be Scheduled, got {}",
                message.status
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO messages (id, text, status, scheduled_at, user_id, telegram_chat_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(message.id)
        .bind(&message.text)
        .bind(message.status)
        .bind(message.scheduled_at)
        .bind(i64::from(message.user_id))
        .bind(i64::from(message.telegram_chat_id))
        .execute(&self.pool)
        .await?;

        tracing::debug!(message_id = %message.id, "Message record created");
        Ok(())
    }

    async fn get_status(&self, id: Uuid) -> Result<MessageStatus, AppError> {
        self.fetch_status(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", id)))
    }

    async fn list(&self) -> Result<Vec<Message>, AppError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT id, text, status, scheduled_at, user_id, telegram_chat_id
            FROM messages
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Message::try_from).collect()
    }

    async fn update_status(&self, id: Uuid, status: MessageStatus) -> Result<(), AppError> {
        check_update_target(status)?;

        // Only a record that is still Scheduled may move; terminal rows stay put.
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(MessageStatus::Scheduled)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let current = self.fetch_status(id).await?;
        resolve_noop_update(id, current, status)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
