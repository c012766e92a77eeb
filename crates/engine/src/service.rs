//! Notification service: the producer side of the pipeline.
//!
//! Creating a notification persists it as `Scheduled` and then publishes its
//! envelope. Status reads go through the cache first and backfill it from the
//! store on a miss.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use notifier_common::cache::StatusCache;
use notifier_common::error::AppError;
use notifier_common::store::MessageStore;
use notifier_common::types::{CreateNotification, Message, MessageStatus};

use crate::publisher::NotificationPublisher;

/// Service layer for notification create/list/status/delete.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn MessageStore>,
    cache: Option<Arc<dyn StatusCache>>,
    publisher: Arc<dyn NotificationPublisher>,
    cache_ttl: Duration,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        cache: Option<Arc<dyn StatusCache>>,
        publisher: Arc<dyn NotificationPublisher>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            publisher,
            cache_ttl,
        }
    }

    /// Schedule a new notification and return its id.
    ///
    /// The record is written before the envelope is published. If publishing
    /// fails the record is removed again, so no `Scheduled` record exists
    /// without an envelope in the queue.
    pub async fn create(&self, request: CreateNotification) -> Result<Uuid, AppError> {
        let message = request.into_message();
        message.validate()?;

        self.store.create(&message).await?;

        if let Err(e) = self.publisher.publish(&message).await {
            tracing::error!(message_id = %message.id, error = %e, "Publish failed, rolling back");
            if let Err(rollback) = self.store.delete(message.id).await {
                tracing::error!(
                    message_id = %message.id,
                    error = %rollback,
                    "Rollback of unpublished message failed"
                );
            }
            return Err(e);
        }

        tracing::info!(
            message_id = %message.id,
            user_id = message.user_id,
            scheduled_at = %message.scheduled_at,
            "Notification scheduled"
        );
        Ok(message.id)
    }

    /// Whether status reads go through a cache.
    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    pub async fn list(&self) -> Result<Vec<Message>, AppError> {
        self.store.list().await
    }

    /// Cache-aside status lookup.
    ///
    /// Only terminal statuses are backfilled, so a pending read never
    /// overwrites the outcome the worker cached.
    pub async fn get_status(&self, id: Uuid) -> Result<MessageStatus, AppError> {
        if let Some(cache) = &self.cache {
            match cache.get_status(id).await {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(message_id = %id, error = %e, "Status cache read failed");
                }
            }
        }

        let status = self.store.get_status(id).await?;

        if status.is_terminal()
            && let Some(cache) = &self.cache
            && let Err(e) = cache.set_status(id, status, self.cache_ttl).await
        {
            tracing::debug!(message_id = %id, error = %e, "Status cache backfill failed");
        }

        Ok(status)
    }

    /// Delete a notification. The worker tolerates records vanishing under it.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        if !self.store.delete(id).await? {
            return Err(AppError::NotFound(format!("Message {} not found", id)));
        }

        if let Some(cache) = &self.cache
            && let Err(e) = cache.evict(id).await
        {
            tracing::debug!(message_id = %id, error = %e, "Status cache eviction failed");
        }

        tracing::info!(message_id = %id, "Notification deleted");
        Ok(())
    }
}
