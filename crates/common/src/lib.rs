//! Shared building blocks for the delayed notifier: domain types, errors,
//! configuration, and the store, cache and broker plumbing used by both the
//! API and the worker.

pub mod amqp;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod store;
pub mod types;
