//! Cache warmer: a periodic task that rehydrates hot keys so the
//! first user request after a cold start or cache flush does not pay the
//! full read-through cost.

use std::sync::Arc;
use std::time::Duration;

use carepoint_core::capability::{CacheStore, FacilityRepository};
use carepoint_core::query::FacilityListFilter;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const FACILITY_TTL_SECONDS: u64 = 300;

/// Number of top facilities warmed per cycle.
const DEFAULT_TOP_N: u32 = 50;
/// Number of default-listing pages warmed per cycle.
const DEFAULT_PREFETCH_PAGES: u32 = 3;
const DEFAULT_PAGE_SIZE: u32 = 20;

/// An owned handle to the running warmer task. Dropping this without
/// calling [`Self::shutdown`] leaves the task running detached; callers
/// that care about clean shutdown should always call `shutdown`.
pub struct CacheWarmerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl CacheWarmerHandle {
    /// Signals the warmer to stop and waits up to `deadline` for it to
    /// finish its current cycle.
    pub async fn shutdown(self, deadline: Duration) {
        self.cancel.cancel();
        let _ = tokio::time::timeout(deadline, self.join).await;
    }
}

/// Spawns the cache warmer: runs one warm cycle immediately, then on a
/// fixed interval until cancelled. Warming failures are logged and
/// ignored — a cold cache degrades to read-through, it does not block
/// startup or user traffic.
pub fn spawn_cache_warmer(
    repository: Arc<dyn FacilityRepository>,
    cache: Arc<dyn CacheStore>,
    interval: Duration,
    top_n: Option<u32>,
) -> CacheWarmerHandle {
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();
    let top_n = top_n.unwrap_or(DEFAULT_TOP_N);

    let join = tokio::spawn(async move {
        warm_once(&repository, &cache, top_n).await;
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; already warmed above
        loop {
            tokio::select! {
                _ = task_cancel.cancelled() => break,
                _ = ticker.tick() => warm_once(&repository, &cache, top_n).await,
            }
        }
    });

    CacheWarmerHandle { cancel, join }
}

async fn warm_once(repository: &Arc<dyn FacilityRepository>, cache: &Arc<dyn CacheStore>, top_n: u32) {
    match repository.top_facilities(top_n).await {
        Ok(facilities) => {
            let entries: Vec<(String, Vec<u8>)> = facilities
                .iter()
                .filter_map(|facility| serde_json::to_vec(facility).ok().map(|bytes| (format!("facility:{}", facility.id), bytes)))
                .collect();
            if let Err(err) = cache.set_multi(entries, FACILITY_TTL_SECONDS).await {
                tracing::warn!(error = %err, "cache warmer: failed to warm top facilities");
            }
        }
        Err(err) => tracing::warn!(error = %err, "cache warmer: failed to list top facilities"),
    }

    // `repository` is expected to be the cached decorator: calling
    // `list` here both warms the page and exercises the decorator's own
    // fill path, so no direct cache write is needed for listing pages.
    for page in 0..DEFAULT_PREFETCH_PAGES {
        let filter = FacilityListFilter { facility_type: None, limit: DEFAULT_PAGE_SIZE, offset: page * DEFAULT_PAGE_SIZE };
        if let Err(err) = repository.list(&filter).await {
            tracing::warn!(error = %err, page, "cache warmer: failed to prefetch listing page");
        }
    }
}
