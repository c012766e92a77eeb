pub mod health;
pub mod notifications;

use axum::Router;
use tower_http::services::ServeDir;

use crate::state::AppState;

/// Build the complete API router with all routes.
///
/// Anything that is not an API route falls through to the web UI files.
pub fn create_router(state: AppState) -> Router {
    let ui = ServeDir::new(&state.static_dir);

    Router::new()
        .merge(health::router())
        .merge(notifications::router())
        .fallback_service(ui)
        .with_state(state)
}
