//! Cache-invalidation listener: subscribes to the event bus and
//! deletes matching key patterns on writes from other replicas.

use std::sync::Arc;
use std::time::Duration;

use carepoint_core::capability::{CacheStore, EventBus};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub struct InvalidationListenerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl InvalidationListenerHandle {
    pub async fn shutdown(self, deadline: Duration) {
        self.cancel.cancel();
        let _ = tokio::time::timeout(deadline, self.join).await;
    }
}

/// Spawns the invalidation listener loop. On subscription loss, reconnects
/// with exponential backoff (1s → 30s cap); on the first successful
/// reconnect it performs a bounded, defensive wildcard invalidation to
/// recover from events it may have missed while disconnected.
pub fn spawn_invalidation_listener(events: Arc<dyn EventBus>, cache: Arc<dyn CacheStore>, node_id: String) -> InvalidationListenerHandle {
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();

    let join = tokio::spawn(async move {
        let mut backoff = INITIAL_BACKOFF;
        let mut first_connection = true;

        loop {
            if task_cancel.is_cancelled() {
                break;
            }

            let mut subscription = match events.subscribe().await {
                Ok(sub) => sub,
                Err(err) => {
                    tracing::warn!(error = %err, backoff_secs = backoff.as_secs(), "invalidation listener: subscribe failed, backing off");
                    tokio::select! {
                        _ = task_cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
            };

            backoff = INITIAL_BACKOFF;
            if !first_connection {
                defensive_recovery_sweep(&cache).await;
            }
            first_connection = false;

            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => return,
                    event = subscription.next_event() => match event {
                        Some(event) => handle_event(&cache, &node_id, event).await,
                        None => {
                            tracing::warn!("invalidation listener: subscription closed, reconnecting");
                            break;
                        }
                    }
                }
            }
        }
    });

    InvalidationListenerHandle { cancel, join }
}

async fn handle_event(cache: &Arc<dyn CacheStore>, node_id: &str, event: carepoint_core::capability::InvalidationEvent) {
    if event.origin() == node_id {
        return; // own writes were already invalidated locally
    }
    if let carepoint_core::capability::InvalidationEvent::FacilityChanged { id, .. } = &event {
        if let Err(err) = cache.delete(&format!("facility:{id}")).await {
            tracing::warn!(%id, error = %err, "invalidation listener: delete failed");
        }
    }
    for pattern in event.patterns() {
        if let Err(err) = cache.delete_pattern(pattern).await {
            tracing::warn!(pattern, error = %err, "invalidation listener: delete_pattern failed");
        }
    }
}

async fn defensive_recovery_sweep(cache: &Arc<dyn CacheStore>) {
    for pattern in ["facilities:list:*", "facilities:search:*"] {
        if let Err(err) = cache.delete_pattern(pattern).await {
            tracing::warn!(pattern, error = %err, "invalidation listener: defensive recovery sweep failed");
        }
    }
}
