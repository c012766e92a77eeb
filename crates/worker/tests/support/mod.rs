//! Test doubles for the worker: an in-memory queue, a scripted delivery
//! action and a clock that follows tokio's (pausable) time.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use notifier_common::cache::StatusCache;
use notifier_common::memory::{MemoryCache, MemoryStore};
use notifier_common::types::{Message, MessageStatus};
use notifier_worker::action::DeliveryAction;
use notifier_worker::clock::Clock;
use notifier_worker::consumer::{RunStats, Worker};
use notifier_worker::error::{DeliveryError, WorkerError};
use notifier_worker::processor::Processor;
use notifier_worker::queue::{DeliveryHandle, Disposition, EnvelopeSource, Incoming};
use notifier_worker::retry::RetryPolicy;

// ============================================================
// Clock
// ============================================================

/// Wall clock anchored at creation that advances with `tokio::time`.
pub struct TestClock {
    wall: DateTime<Utc>,
    base: Instant,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            wall: Utc::now(),
            base: Instant::now(),
        }
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        self.wall + chrono::Duration::from_std(self.base.elapsed()).unwrap()
    }
}

// ============================================================
// Queue
// ============================================================

/// Records how each envelope (by push order) was settled.
#[derive(Clone, Default)]
pub struct Settlements(Arc<Mutex<Vec<(usize, Disposition)>>>);

impl Settlements {
    pub fn all(&self) -> Vec<(usize, Disposition)> {
        let mut all = self.0.lock().unwrap().clone();
        all.sort_by_key(|(tag, _)| *tag);
        all
    }

    pub fn of(&self, tag: usize) -> Option<Disposition> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, d)| *d)
    }
}

struct RecordingHandle {
    tag: usize,
    settlements: Settlements,
}

#[async_trait]
impl DeliveryHandle for RecordingHandle {
    async fn settle(self: Box<Self>, disposition: Disposition) -> Result<(), WorkerError> {
        self.settlements.0.lock().unwrap().push((self.tag, disposition));
        Ok(())
    }
}

/// Producer half of the in-memory queue.
pub struct TestQueue {
    tx: Option<mpsc::UnboundedSender<Incoming>>,
    next_tag: usize,
    pub settlements: Settlements,
}

/// Consumer half; counts how many envelopes the worker pulled.
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<Incoming>,
    pulled: Arc<AtomicUsize>,
}

#[async_trait]
impl EnvelopeSource for ChannelSource {
    async fn next(&mut self) -> Option<Result<Incoming, WorkerError>> {
        let incoming = self.rx.recv().await?;
        self.pulled.fetch_add(1, Ordering::SeqCst);
        Some(Ok(incoming))
    }
}

pub fn queue() -> (TestQueue, ChannelSource, Arc<AtomicUsize>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pulled = Arc::new(AtomicUsize::new(0));
    (
        TestQueue {
            tx: Some(tx),
            next_tag: 0,
            settlements: Settlements::default(),
        },
        ChannelSource {
            rx,
            pulled: pulled.clone(),
        },
        pulled,
    )
}

impl TestQueue {
    /// Enqueue a raw body; returns its tag.
    pub fn push_raw(&mut self, body: Vec<u8>) -> usize {
        let tag = self.next_tag;
        self.next_tag += 1;
        let incoming = Incoming {
            body,
            redelivered: false,
            handle: Box::new(RecordingHandle {
                tag,
                settlements: self.settlements.clone(),
            }),
        };
        self.tx
            .as_ref()
            .expect("queue already closed")
            .send(incoming)
            .unwrap();
        tag
    }

    pub fn push(&mut self, message: &Message) -> usize {
        self.push_raw(serde_json::to_vec(message).unwrap())
    }

    /// Close the queue so `Worker::run` returns after draining.
    pub fn close(&mut self) {
        self.tx = None;
    }
}

// ============================================================
// Delivery action
// ============================================================

/// Fails the first `failures` calls, then succeeds. Records call instants.
pub struct ScriptedAction {
    failures: usize,
    calls: Mutex<Vec<(Uuid, Instant)>>,
}

impl ScriptedAction {
    pub fn failing(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn always_ok() -> Arc<Self> {
        Self::failing(0)
    }

    pub fn always_failing() -> Arc<Self> {
        Self::failing(usize::MAX)
    }

    pub fn calls(&self) -> Vec<(Uuid, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, id: Uuid) -> Vec<Instant> {
        self.calls()
            .into_iter()
            .filter(|(call_id, _)| *call_id == id)
            .map(|(_, at)| at)
            .collect()
    }
}

#[async_trait]
impl DeliveryAction for ScriptedAction {
    async fn deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push((message.id, Instant::now()));
        if calls.len() <= self.failures {
            Err(DeliveryError::new(format!("attempt {} failed", calls.len())))
        } else {
            Ok(())
        }
    }
}

// ============================================================
// Harness
// ============================================================

pub const CACHE_TTL: Duration = Duration::from_secs(300);

pub struct Harness {
    pub store: MemoryStore,
    pub cache: MemoryCache,
    pub clock: Arc<TestClock>,
    pub start: Instant,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            cache: MemoryCache::new(),
            clock: Arc::new(TestClock::new()),
            start: Instant::now(),
        }
    }

    /// A stored `Scheduled` message due `delay` from now.
    pub fn schedule(&self, delay: chrono::Duration) -> Message {
        let message = Message {
            id: Uuid::new_v4(),
            text: "reminder".to_string(),
            status: MessageStatus::Scheduled,
            scheduled_at: self.clock.now() + delay,
            user_id: 1,
            telegram_chat_id: 100,
        };
        self.store.insert(message.clone());
        message
    }

    pub fn worker(
        &self,
        action: Arc<ScriptedAction>,
        policy: RetryPolicy,
        max_in_flight: usize,
        with_cache: bool,
    ) -> Worker {
        let cache: Option<Arc<dyn StatusCache>> = if with_cache {
            Some(Arc::new(self.cache.clone()))
        } else {
            None
        };
        let processor = Processor::new(
            Arc::new(self.store.clone()),
            cache,
            action,
            policy,
            self.clock.clone(),
            CACHE_TTL,
        );
        Worker::new(processor, max_in_flight)
    }

    pub fn since_start(&self, at: Instant) -> Duration {
        at - self.start
    }
}

pub fn policy(delays_secs: &[u64]) -> RetryPolicy {
    RetryPolicy::new(
        delays_secs.len() as u32 + 1,
        delays_secs.iter().copied().map(Duration::from_secs).collect(),
    )
    .unwrap()
}

pub fn spawn_run(
    worker: Worker,
    source: ChannelSource,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<RunStats> {
    tokio::spawn(async move { worker.run(source, shutdown).await })
}
