//! Shared application state for the Axum API server.

use std::path::PathBuf;

use notifier_engine::service::NotificationService;

/// Web UI shipped with this crate.
pub const DEFAULT_STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/static");

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub notifications: NotificationService,
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(notifications: NotificationService) -> Self {
        Self {
            notifications,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
        }
    }

    /// Serve the web UI from `dir` instead of the bundled one.
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = dir.into();
        self
    }
}
