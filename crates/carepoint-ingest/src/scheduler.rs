//! Ingestion scheduler: runs the configured startup sync (bounded retry
//! cap, short backoff) and, when an interval is configured, a periodic
//! sync thereafter. `IngestionCoordinator::sync_current_data` already
//! enforces at-most-one-sync-per-provider; this module owns the task that
//! calls it on a timer and bounds each run with a timeout.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::coordinator::IngestionCoordinator;

pub struct IngestionSchedulerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl IngestionSchedulerHandle {
    pub async fn shutdown(self, deadline: Duration) {
        self.cancel.cancel();
        let _ = tokio::time::timeout(deadline, self.join).await;
    }
}

/// Spawns the scheduler. If `run_on_start` is set, attempts a sync up to
/// `startup_retry_cap` times with a short fixed backoff before giving up
/// and falling through to the periodic loop (if configured). If
/// `interval` is `None`, the task exits after the startup attempt (or
/// immediately, if neither is configured).
pub fn spawn_ingestion_scheduler(
    coordinator: Arc<IngestionCoordinator>,
    provider_id: String,
    run_on_start: bool,
    startup_retry_cap: u32,
    interval: Option<Duration>,
    run_timeout: Duration,
) -> IngestionSchedulerHandle {
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();

    let join = tokio::spawn(async move {
        if run_on_start {
            run_startup_with_retry(&coordinator, &provider_id, startup_retry_cap, run_timeout, &task_cancel).await;
        }

        let Some(interval) = interval else { return };
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = task_cancel.cancelled() => break,
                _ = ticker.tick() => run_bounded(&coordinator, &provider_id, run_timeout).await,
            }
        }
    });

    IngestionSchedulerHandle { cancel, join }
}

async fn run_startup_with_retry(coordinator: &Arc<IngestionCoordinator>, provider_id: &str, retry_cap: u32, run_timeout: Duration, cancel: &CancellationToken) {
    for attempt in 0..retry_cap.max(1) {
        match tokio::time::timeout(run_timeout, coordinator.sync_current_data(provider_id)).await {
            Ok(Ok(summary)) => {
                tracing::info!(provider_id, ?summary, "startup ingestion sync completed");
                return;
            }
            Ok(Err(err)) => tracing::warn!(provider_id, attempt, error = %err, "startup ingestion sync failed"),
            Err(_) => tracing::warn!(provider_id, attempt, "startup ingestion sync timed out"),
        }
        if attempt + 1 == retry_cap {
            break;
        }
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(crate::backoff::delay_for_attempt(attempt)) => {}
        }
    }
    tracing::warn!(provider_id, "startup ingestion sync exhausted retries, giving up");
}

async fn run_bounded(coordinator: &Arc<IngestionCoordinator>, provider_id: &str, run_timeout: Duration) {
    match tokio::time::timeout(run_timeout, coordinator.sync_current_data(provider_id)).await {
        Ok(Ok(summary)) => tracing::info!(provider_id, ?summary, "periodic ingestion sync completed"),
        Ok(Err(err)) => tracing::warn!(provider_id, error = %err, "periodic ingestion sync failed"),
        Err(_) => tracing::warn!(provider_id, "periodic ingestion sync timed out"),
    }
}
