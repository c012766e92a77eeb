//! In-memory `MessageStore` and `StatusCache` for tests.
//!
//! Both apply the same rules as the real backends and additionally record
//! every status write so tests can assert on the full history.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::cache::StatusCache;
use crate::error::AppError;
use crate::store::{MessageStore, check_update_target, resolve_noop_update};
use crate::types::{Message, MessageStatus};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct StoreState {
    messages: Vec<Message>,
    updates: Vec<(Uuid, MessageStatus)>,
    fail_writes: bool,
    fail_reads: bool,
}

/// Vector-backed store; insertion order doubles as creation order.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly, bypassing the `Scheduled` check.
    pub fn insert(&self, message: Message) {
        lock(&self.state).messages.push(message);
    }

    pub fn status_of(&self, id: Uuid) -> Option<MessageStatus> {
        lock(&self.state)
            .messages
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.status)
    }

    /// Every successful `update_status` call, in order.
    pub fn updates(&self) -> Vec<(Uuid, MessageStatus)> {
        lock(&self.state).updates.clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every subsequent write fail with an internal error.
    pub fn set_fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }

    /// Make every subsequent read fail with an internal error.
    pub fn set_fail_reads(&self, fail: bool) {
        lock(&self.state).fail_reads = fail;
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create(&self, message: &Message) -> Result<(), AppError> {
        let mut state = lock(&self.state);
        if state.fail_writes {
            return Err(AppError::Internal("store unavailable".to_string()));
        }
        if message.status != MessageStatus::Scheduled {
            return Err(AppError::Validation(format!(
                "new messages must be Scheduled, got {}",
                message.status
            )));
        }
        if state.messages.iter().any(|m| m.id == message.id) {
            return Err(AppError::Conflict(format!(
                "Message {} already exists",
                message.id
            )));
        }
        state.messages.push(message.clone());
        Ok(())
    }

    async fn get_status(&self, id: Uuid) -> Result<MessageStatus, AppError> {
        if lock(&self.state).fail_reads {
            return Err(AppError::Internal("store unavailable".to_string()));
        }
        self.status_of(id)
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", id)))
    }

    async fn list(&self) -> Result<Vec<Message>, AppError> {
        let state = lock(&self.state);
        if state.fail_reads {
            return Err(AppError::Internal("store unavailable".to_string()));
        }
        Ok(state.messages.iter().rev().cloned().collect())
    }

    async fn update_status(&self, id: Uuid, status: MessageStatus) -> Result<(), AppError> {
        check_update_target(status)?;

        let mut guard = lock(&self.state);
        let state = &mut *guard;
        if state.fail_writes {
            return Err(AppError::Internal("store unavailable".to_string()));
        }

        match state.messages.iter_mut().find(|m| m.id == id) {
            Some(message) if message.status == MessageStatus::Scheduled => {
                message.status = status;
                state.updates.push((id, status));
                Ok(())
            }
            Some(message) => resolve_noop_update(id, Some(message.status), status),
            None => resolve_noop_update(id, None, status),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = lock(&self.state);
        if state.fail_writes {
            return Err(AppError::Internal("store unavailable".to_string()));
        }
        let before = state.messages.len();
        state.messages.retain(|m| m.id != id);
        Ok(state.messages.len() < before)
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<Uuid, (MessageStatus, Duration)>,
    fail: bool,
}

/// Map-backed cache. TTLs are recorded, not enforced.
#[derive(Clone, Default)]
pub struct MemoryCache {
    state: Arc<Mutex<CacheState>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, id: Uuid) -> Option<(MessageStatus, Duration)> {
        lock(&self.state).entries.get(&id).copied()
    }

    pub fn put(&self, id: Uuid, status: MessageStatus) {
        lock(&self.state)
            .entries
            .insert(id, (status, Duration::from_secs(300)));
    }

    /// Make every subsequent call fail with an internal error.
    pub fn set_fail(&self, fail: bool) {
        lock(&self.state).fail = fail;
    }
}

#[async_trait]
impl StatusCache for MemoryCache {
    async fn get_status(&self, id: Uuid) -> Result<Option<MessageStatus>, AppError> {
        let state = lock(&self.state);
        if state.fail {
            return Err(AppError::Internal("cache unavailable".to_string()));
        }
        Ok(state.entries.get(&id).map(|(status, _)| *status))
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: MessageStatus,
        ttl: Duration,
    ) -> Result<(), AppError> {
        let mut state = lock(&self.state);
        if state.fail {
            return Err(AppError::Internal("cache unavailable".to_string()));
        }
        state.entries.insert(id, (status, ttl));
        Ok(())
    }

    async fn evict(&self, id: Uuid) -> Result<(), AppError> {
        let mut state = lock(&self.state);
        if state.fail {
            return Err(AppError::Internal("cache unavailable".to_string()));
        }
        state.entries.remove(&id);
        Ok(())
    }
}
