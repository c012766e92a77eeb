use thiserror::Error;

use notifier_common::error::AppError;

/// Why a single delivery attempt failed.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct DeliveryError(pub String);

impl DeliveryError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        Self(e.to_string())
    }
}

/// Shutdown arrived before the unit of work reached a terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("interrupted by shutdown")]
pub struct Interrupted;

/// Errors surfaced by the worker's queue plumbing.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Queue error: {0}")]
    Queue(#[from] lapin::Error),

    #[error(transparent)]
    App(#[from] AppError),
}
