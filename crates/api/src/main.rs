//! Delayed notifier API server binary entrypoint.

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use notifier_common::amqp;
use notifier_common::cache::{RedisStatusCache, StatusCache};
use notifier_common::config::AppConfig;
use notifier_common::db::{create_pool, run_migrations};
use notifier_common::store::PgMessageStore;
use notifier_engine::publisher::AmqpPublisher;
use notifier_engine::service::NotificationService;

use notifier_api::routes::create_router;
use notifier_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("notifier_api=debug,notifier_engine=debug,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting delayed notifier API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Create database connection pool
    let pool = create_pool(&config).await?;
    run_migrations(&pool).await?;

    // Redis is optional; a configured but unreachable Redis is fatal
    let cache: Option<Arc<dyn StatusCache>> = match &config.redis_url {
        Some(url) => Some(Arc::new(RedisStatusCache::connect(url).await?)),
        None => {
            tracing::warn!("REDIS_URL not set, status cache disabled");
            None
        }
    };

    // Connect to RabbitMQ and declare the topology
    let conn = amqp::connect(&config.rabbit_url, "delayed_notifier_api").await?;
    let publisher = AmqpPublisher::new(&conn, config.queue_message_ttl()).await?;

    // Build application state
    let notifications = NotificationService::new(
        Arc::new(PgMessageStore::new(pool)),
        cache,
        Arc::new(publisher),
        config.status_cache_ttl(),
    );
    let mut state = AppState::new(notifications);
    if let Some(dir) = &config.static_dir {
        state = state.with_static_dir(dir);
    }
    tracing::info!(dir = %state.static_dir.display(), "Serving web UI");

    // Build router
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = config.http_bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received shutdown signal, stopping gracefully...");
        })
        .await?;

    if let Err(e) = conn.close(200, "api shutdown").await {
        tracing::warn!(error = %e, "Failed to close AMQP connection");
    }

    tracing::info!("API server stopped.");
    Ok(())
}
