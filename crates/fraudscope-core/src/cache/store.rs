//! Key-addressed cache of query results.
//!
//! Cache operations are synchronous and never hold the lock across an
//! `.await`; only the fetch itself suspends. Every fetch takes a ticket
//! (sequence number + cache epoch) before it starts and can only write its
//! result back if no newer result for the same key has landed in between and
//! the cache has not been cleared since.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::entry::{CacheEntry, QuerySnapshot, QueryStatus};
use super::key::QueryKey;
use super::policy::StalePolicy;
use crate::api::{ApiError, ApiResult};

#[derive(Default)]
struct CacheState {
    entries: HashMap<QueryKey, CacheEntry>,
    /// Bumped by `clear`; tickets from an older epoch are discarded.
    epoch: u64,
    /// Cache-wide fetch sequence. Never reset, so a ticket issued before an
    /// entry was removed can not pass for one issued after.
    sequence: u64,
}

impl CacheState {
    /// Take the next sequence number and the entry for `key`. A new entry
    /// starts just below the returned number.
    fn issue(&mut self, key: &QueryKey, policy: StalePolicy) -> (u64, &mut CacheEntry) {
        let origin = self.sequence;
        self.sequence += 1;
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(policy, origin));
        (origin + 1, entry)
    }
}

/// Permission to write one fetch result back into the cache.
#[derive(Debug)]
pub struct FetchTicket {
    key: QueryKey,
    seq: u64,
    epoch: u64,
}

/// Shared query cache. Clone is cheap.
#[derive(Clone, Default)]
pub struct QueryCache {
    state: Arc<Mutex<CacheState>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self.lock().entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Current state of `key` without triggering a fetch.
    pub fn peek<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<QuerySnapshot<T>> {
        let mut state = self.lock();
        let entry = state.entries.get_mut(key)?;
        let now = Instant::now();
        entry.last_accessed = now;
        Some(snapshot(entry, now))
    }

    pub fn status(&self, key: &QueryKey) -> Option<QueryStatus> {
        let state = self.lock();
        state.entries.get(key).map(|e| e.status(Instant::now()))
    }

    /// Whether reading `key` now would go to the network.
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        let state = self.lock();
        state
            .entries
            .get(key)
            .map(|e| e.is_stale(Instant::now()))
            .unwrap_or(true)
    }

    fn fresh_data<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let mut state = self.lock();
        let entry = state.entries.get_mut(key)?;
        let now = Instant::now();
        entry.last_accessed = now;
        if entry.is_stale(now) {
            return None;
        }
        entry
            .data
            .as_ref()
            .and_then(|data| serde_json::from_value(data.clone()).ok())
    }

    /// Register a fetch for `key`, creating the entry if needed.
    pub fn begin_fetch(&self, key: &QueryKey, policy: StalePolicy) -> FetchTicket {
        let mut state = self.lock();
        let epoch = state.epoch;
        let (seq, entry) = state.issue(key, policy);
        entry.policy = policy;
        entry.last_accessed = Instant::now();
        entry.issue(seq);
        trace!(key = %key, seq, "Fetch started");
        FetchTicket {
            key: key.clone(),
            seq,
            epoch,
        }
    }

    /// Write back a fetch result. Returns whether the result was applied.
    pub fn finish_fetch(&self, ticket: FetchTicket, result: Result<Value, String>) -> bool {
        let mut state = self.lock();
        if ticket.epoch != state.epoch {
            debug!(key = %ticket.key, "Discarding result fetched before cache was cleared");
            return false;
        }
        let entry = match state.entries.get_mut(&ticket.key) {
            Some(entry) if entry.owns(ticket.seq) => entry,
            _ => {
                debug!(key = %ticket.key, seq = ticket.seq, "Discarding result for removed entry");
                return false;
            }
        };
        entry.in_flight = entry.in_flight.saturating_sub(1);

        let applied = match result {
            Ok(data) => entry.apply(ticket.seq, data),
            Err(message) => entry.fail(ticket.seq, message),
        };
        if !applied {
            debug!(key = %ticket.key, seq = ticket.seq, "Discarding out-of-order result");
        }
        applied
    }

    /// Read through the cache: fresh data is returned as is, otherwise the
    /// fetcher runs and its result is stored.
    pub async fn query<T, F, Fut>(&self, key: QueryKey, policy: StalePolicy, fetch: F) -> ApiResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        if let Some(data) = self.fresh_data(&key) {
            trace!(key = %key, "Cache hit");
            return Ok(data);
        }

        debug!(key = %key, "Cache miss, fetching");
        let ticket = self.begin_fetch(&key, policy);
        match fetch().await {
            Ok(data) => {
                let value = match serde_json::to_value(&data) {
                    Ok(value) => value,
                    Err(e) => {
                        self.finish_fetch(ticket, Err(e.to_string()));
                        return Err(ApiError::InvalidResponse(format!(
                            "Cannot cache response for {}: {}",
                            key, e
                        )));
                    }
                };
                self.finish_fetch(ticket, Ok(value));
                Ok(data)
            }
            Err(e) => {
                self.finish_fetch(ticket, Err(e.to_string()));
                Err(e)
            }
        }
    }

    /// Return what is cached right away and, when it is stale and nothing is
    /// already fetching it, refresh it in a background task.
    pub fn query_background<T, F, Fut>(
        &self,
        key: QueryKey,
        policy: StalePolicy,
        fetch: F,
    ) -> QuerySnapshot<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let needs_fetch = {
            let state = self.lock();
            state
                .entries
                .get(&key)
                .map(|e| e.in_flight == 0 && e.is_stale(Instant::now()))
                .unwrap_or(true)
        };

        if needs_fetch {
            let ticket = self.begin_fetch(&key, policy);
            let cache = self.clone();
            tokio::spawn(async move {
                let result = fetch()
                    .await
                    .map_err(|e| e.to_string())
                    .and_then(|data| serde_json::to_value(&data).map_err(|e| e.to_string()));
                cache.finish_fetch(ticket, result);
            });
        }

        let mut state = self.lock();
        let now = Instant::now();
        match state.entries.get_mut(&key) {
            Some(entry) => {
                entry.last_accessed = now;
                snapshot(entry, now)
            }
            None => QuerySnapshot {
                data: None,
                status: QueryStatus::Stale,
                is_fetching: false,
                fetched_at: None,
                error: None,
            },
        }
    }

    /// Write data for `key` directly, superseding in-flight fetches.
    pub fn set_query_data<T: Serialize>(&self, key: &QueryKey, data: &T) -> ApiResult<()> {
        let value = serde_json::to_value(data)
            .map_err(|e| ApiError::InvalidRequest(format!("Cannot cache data for {}: {}", key, e)))?;
        let mut state = self.lock();
        let (seq, entry) = state.issue(key, StalePolicy::DEFAULT);
        entry.overwrite(seq, value);
        entry.last_accessed = Instant::now();
        debug!(key = %key, "Cache entry written directly");
        Ok(())
    }

    /// Mark every entry under `prefix` stale. Returns how many matched.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut state = self.lock();
        let mut count = 0;
        for (key, entry) in state.entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.invalidate();
                count += 1;
            }
        }
        debug!(prefix = %prefix, count, "Invalidated cache entries");
        count
    }

    pub fn invalidate_many(&self, prefixes: &[QueryKey]) -> usize {
        prefixes.iter().map(|p| self.invalidate(p)).sum()
    }

    pub fn invalidate_all(&self) -> usize {
        let mut state = self.lock();
        for entry in state.entries.values_mut() {
            entry.invalidate();
        }
        state.entries.len()
    }

    /// Drop every entry under `prefix`.
    pub fn remove(&self, prefix: &QueryKey) -> usize {
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|key, _| !key.starts_with(prefix));
        before - state.entries.len()
    }

    /// Keep `key` from being collected while the returned guard lives.
    pub fn subscribe(&self, key: &QueryKey, policy: StalePolicy) -> Subscription {
        let mut state = self.lock();
        let origin = state.sequence;
        state
            .entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(policy, origin))
            .subscribers += 1;
        Subscription {
            cache: self.clone(),
            key: key.clone(),
        }
    }

    fn unsubscribe(&self, key: &QueryKey) {
        let mut state = self.lock();
        if let Some(entry) = state.entries.get_mut(key) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
            entry.last_accessed = Instant::now();
        }
    }

    /// Evict unobserved entries idle for longer than their GC window.
    pub fn gc(&self) -> usize {
        let mut state = self.lock();
        let now = Instant::now();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_collectable(now));
        before - state.entries.len()
    }

    /// Drop everything. Results of fetches started before this are ignored.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.epoch += 1;
        debug!(epoch = state.epoch, "Query cache cleared");
    }
}

fn snapshot<T: DeserializeOwned>(entry: &CacheEntry, now: Instant) -> QuerySnapshot<T> {
    QuerySnapshot {
        data: entry
            .data
            .as_ref()
            .and_then(|data| serde_json::from_value(data.clone()).ok()),
        status: entry.status(now),
        is_fetching: entry.in_flight > 0,
        fetched_at: entry.fetched_at,
        error: entry.error.clone(),
    }
}

/// Marks a key as observed. Dropping it makes the entry collectable again.
pub struct Subscription {
    cache: QueryCache,
    key: QueryKey,
}

impl Subscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cache.unsubscribe(&self.key);
    }
}
