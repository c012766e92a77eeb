//! Cancellable waits: the scheduled-time wait and the inter-attempt backoff.
//!
//! These are the only places a unit of work suspends.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::error::Interrupted;

/// Sleep for `duration` unless shutdown is signalled first.
pub async fn sleep_or_cancel(
    duration: Duration,
    shutdown: &CancellationToken,
) -> Result<(), Interrupted> {
    if duration.is_zero() {
        return Ok(());
    }
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => Err(Interrupted),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Time left until `deadline`, zero if it has passed.
pub fn remaining(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (deadline - now).to_std().unwrap_or(Duration::ZERO)
}

/// Suspend until `deadline`. Returns immediately when it is already due.
///
/// Returns how long the wait was.
pub async fn wait_until(
    deadline: DateTime<Utc>,
    clock: &dyn Clock,
    shutdown: &CancellationToken,
) -> Result<Duration, Interrupted> {
    let wait = remaining(deadline, clock.now());
    sleep_or_cancel(wait, shutdown).await?;
    Ok(wait)
}
