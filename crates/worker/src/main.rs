//! Delayed notifier worker binary entrypoint.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use notifier_common::amqp;
use notifier_common::cache::{RedisStatusCache, StatusCache};
use notifier_common::config::AppConfig;
use notifier_common::db::create_pool;
use notifier_common::store::PgMessageStore;

use notifier_worker::action::{DeliveryAction, LogAction, WebhookAction};
use notifier_worker::amqp::AmqpSource;
use notifier_worker::clock::SystemClock;
use notifier_worker::consumer::Worker;
use notifier_worker::processor::Processor;
use notifier_worker::retry::RetryPolicy;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notifier_worker=info,notifier_common=info".into()),
        )
        .json()
        .init();

    tracing::info!("Delayed notifier worker starting...");

    // Load configuration
    let config = AppConfig::from_env()?;
    let policy = RetryPolicy::from_config(&config)?;

    // Connect to database
    let pool = create_pool(&config).await?;
    let store = Arc::new(PgMessageStore::new(pool));

    // Status cache is optional
    let cache: Option<Arc<dyn StatusCache>> = match &config.redis_url {
        Some(url) => Some(Arc::new(RedisStatusCache::connect(url).await?)),
        None => {
            tracing::warn!("REDIS_URL not set, status cache disabled");
            None
        }
    };

    let action: Arc<dyn DeliveryAction> = match &config.delivery_webhook_url {
        Some(url) => {
            tracing::info!(url = %url, "Delivering notifications to webhook");
            Arc::new(WebhookAction::new(url.clone(), WEBHOOK_TIMEOUT)?)
        }
        None => Arc::new(LogAction),
    };

    // Connect to RabbitMQ
    let conn = amqp::connect(&config.rabbit_url, "delayed_notifier_worker").await?;
    let channel = conn.create_channel().await?;
    let source = AmqpSource::start(&channel, config.worker_prefetch).await?;

    let processor = Processor::new(
        store,
        cache,
        action,
        policy,
        Arc::new(SystemClock),
        config.status_cache_ttl(),
    );
    let worker = Worker::new(processor, usize::from(config.worker_prefetch));

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let stats = worker.run(source, shutdown).await;

    // Requeues above are already sent; closing flushes the channel.
    if let Err(e) = channel.close(200, "worker shutdown").await {
        tracing::warn!(error = %e, "Failed to close AMQP channel");
    }
    if let Err(e) = conn.close(200, "worker shutdown").await {
        tracing::warn!(error = %e, "Failed to close AMQP connection");
    }

    if stats.source_closed {
        anyhow::bail!("queue consumer closed unexpectedly");
    }

    tracing::info!("Delayed notifier worker stopped.");
    Ok(())
}

/// Cancel `token` on Ctrl+C or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Received shutdown signal, stopping gracefully...");
    token.cancel();
}
