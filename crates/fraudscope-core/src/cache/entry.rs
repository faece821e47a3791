use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::time::Instant;

use super::policy::StalePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Fresh,
    Stale,
    Fetching,
    Error,
}

/// One cached query result and its bookkeeping.
#[derive(Debug)]
pub(crate) struct CacheEntry {
    pub data: Option<Value>,
    pub policy: StalePolicy,
    /// When `data` was last written (monotonic, drives staleness).
    pub updated_at: Option<Instant>,
    /// Wall-clock time of the last write, for display.
    pub fetched_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub invalidated: bool,
    /// Sequence number handed to the most recently started fetch.
    pub last_issued: u64,
    /// Sequence number of the fetch whose result `data` holds.
    pub last_applied: u64,
    /// Fetches issued at or before this sequence started before the last
    /// invalidation; their results are kept but stay stale.
    pub invalidated_through: u64,
    /// Cache-wide sequence when this entry was created. Tickets at or below
    /// it were issued to an earlier entry under the same key.
    pub origin: u64,
    pub in_flight: usize,
    pub subscribers: usize,
    pub last_accessed: Instant,
}

impl CacheEntry {
    pub fn new(policy: StalePolicy, origin: u64) -> Self {
        Self {
            data: None,
            policy,
            updated_at: None,
            fetched_at: None,
            error: None,
            invalidated: false,
            last_issued: origin,
            last_applied: origin,
            invalidated_through: origin,
            origin,
            in_flight: 0,
            subscribers: 0,
            last_accessed: Instant::now(),
        }
    }

    pub fn is_stale(&self, now: Instant) -> bool {
        match (self.data.is_some(), self.updated_at) {
            (true, Some(updated_at)) => {
                self.invalidated || now.saturating_duration_since(updated_at) >= self.policy.stale_time
            }
            _ => true,
        }
    }

    pub fn status(&self, now: Instant) -> QueryStatus {
        if self.in_flight > 0 {
            QueryStatus::Fetching
        } else if self.error.is_some() {
            QueryStatus::Error
        } else if self.is_stale(now) {
            QueryStatus::Stale
        } else {
            QueryStatus::Fresh
        }
    }

    /// Record a fetch started under the cache-wide sequence `seq`.
    pub fn issue(&mut self, seq: u64) {
        self.last_issued = self.last_issued.max(seq);
        self.in_flight += 1;
    }

    /// Whether a ticket numbered `seq` was issued to this entry.
    pub fn owns(&self, seq: u64) -> bool {
        seq > self.origin
    }

    /// Store a result issued as `seq`. Returns false when a newer result has
    /// already been applied.
    pub fn apply(&mut self, seq: u64, data: Value) -> bool {
        if seq <= self.last_applied {
            return false;
        }
        self.data = Some(data);
        self.updated_at = Some(Instant::now());
        self.fetched_at = Some(Utc::now());
        self.error = None;
        self.last_applied = seq;
        self.invalidated = seq <= self.invalidated_through;
        true
    }

    pub fn fail(&mut self, seq: u64, message: String) -> bool {
        if seq <= self.last_applied {
            return false;
        }
        self.error = Some(message);
        true
    }

    /// Write data directly, superseding every fetch already in flight.
    pub fn overwrite(&mut self, seq: u64, data: Value) {
        self.last_issued = self.last_issued.max(seq);
        self.apply(seq, data);
        self.invalidated = false;
    }

    pub fn invalidate(&mut self) {
        self.invalidated = true;
        self.invalidated_through = self.last_issued;
    }

    pub fn is_collectable(&self, now: Instant) -> bool {
        self.subscribers == 0
            && self.in_flight == 0
            && now.saturating_duration_since(self.last_accessed) >= self.policy.gc_time
    }
}

/// Point-in-time view of a cached query.
#[derive(Debug, Clone)]
pub struct QuerySnapshot<T> {
    pub data: Option<T>,
    pub status: QueryStatus,
    /// A fetch for this key is in flight.
    pub is_fetching: bool,
    pub fetched_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl<T> QuerySnapshot<T> {
    pub fn is_fresh(&self) -> bool {
        self.status == QueryStatus::Fresh
    }

    /// Data is absent and a fetch is running.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.is_fetching
    }

    pub fn age_minutes(&self) -> Option<i64> {
        self.fetched_at.map(|at| (Utc::now() - at).num_minutes())
    }

    pub fn age_display(&self) -> String {
        let minutes = match self.age_minutes() {
            Some(minutes) => minutes,
            None => return "never".to_string(),
        };
        if minutes < 1 {
            // Includes clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}
