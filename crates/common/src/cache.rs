//! Status cache: fast read path for message status lookups.
//!
//! The cache is strictly an optimization: every write is best effort and
//! the store stays the source of truth.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use uuid::Uuid;

use crate::error::AppError;
use crate::types::MessageStatus;

const STATUS_KEY_PREFIX: &str = "msg_status:";

#[async_trait]
pub trait StatusCache: Send + Sync {
    /// Cached status, `None` on a miss.
    async fn get_status(&self, id: Uuid) -> Result<Option<MessageStatus>, AppError>;

    async fn set_status(
        &self,
        id: Uuid,
        status: MessageStatus,
        ttl: Duration,
    ) -> Result<(), AppError>;

    async fn evict(&self, id: Uuid) -> Result<(), AppError>;
}

pub fn status_key(id: Uuid) -> String {
    format!("{}{}", STATUS_KEY_PREFIX, id)
}

/// Redis-backed status cache.
#[derive(Clone)]
pub struct RedisStatusCache {
    conn: ConnectionManager,
}

impl RedisStatusCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Open a managed connection to `redis_url`. The manager reconnects on its own.
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        tracing::info!("Connected to Redis status cache");
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl StatusCache for RedisStatusCache {
    async fn get_status(&self, id: Uuid) -> Result<Option<MessageStatus>, AppError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(status_key(id)).await?;

        match raw {
            None => Ok(None),
            // An unreadable entry is treated as a miss so the store gets consulted.
            Some(value) => match value.parse::<MessageStatus>() {
                Ok(status) => Ok(Some(status)),
                Err(e) => {
                    tracing::warn!(message_id = %id, error = %e, "Ignoring corrupt cache entry");
                    Ok(None)
                }
            },
        }
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: MessageStatus,
        ttl: Duration,
    ) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(status_key(id), status.as_str(), ttl_secs)
            .await?;
        Ok(())
    }

    async fn evict(&self, id: Uuid) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(status_key(id)).await?;
        Ok(())
    }
}
