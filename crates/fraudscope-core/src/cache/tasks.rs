//! Background cache tasks.
//!
//! Both tasks loop forever; abort the returned handle to stop them.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::key::QueryKey;
use super::policy::StalePolicy;
use super::store::QueryCache;
use crate::api::ApiResult;

/// Refetch `key` every `policy.refetch_interval` (or `fallback` when the
/// policy does not poll).
///
/// The task holds a subscription on the key for as long as it runs, so a
/// polled entry is never garbage collected.
pub fn spawn_polling<T, F, Fut>(
    cache: QueryCache,
    key: QueryKey,
    policy: StalePolicy,
    fallback: Duration,
    fetch: F,
) -> JoinHandle<()>
where
    T: Serialize + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
{
    let interval = policy.refetch_interval.unwrap_or(fallback);

    tokio::spawn(async move {
        info!(key = %key, interval_secs = interval.as_secs(), "Starting polling task");
        let _subscription = cache.subscribe(&key, policy);
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;

            let ticket = cache.begin_fetch(&key, policy);
            let result = fetch()
                .await
                .map_err(|e| e.to_string())
                .and_then(|data| serde_json::to_value(&data).map_err(|e| e.to_string()));

            if let Err(e) = &result {
                warn!(key = %key, error = %e, "Poll failed");
            }
            cache.finish_fetch(ticket, result);
        }
    })
}

/// Periodically evict idle, unobserved entries.
pub fn spawn_gc_task(cache: QueryCache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Starting cache GC task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.gc();
            if removed > 0 {
                info!(removed, "Cache GC evicted idle entries");
            } else {
                debug!("Cache GC: nothing to evict");
            }
        }
    })
}
