use std::time::Duration;

/// Freshness and retention settings for one kind of query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalePolicy {
    /// Age after which cached data is refetched on the next read.
    pub stale_time: Duration,
    /// Idle time after which an unobserved entry is evicted.
    pub gc_time: Duration,
    /// Background polling interval, for queries that poll.
    pub refetch_interval: Option<Duration>,
}

const fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

impl StalePolicy {
    pub const fn new(stale_time: Duration, gc_time: Duration) -> Self {
        Self {
            stale_time,
            gc_time,
            refetch_interval: None,
        }
    }

    pub const fn polling(mut self, interval: Duration) -> Self {
        self.refetch_interval = Some(interval);
        self
    }

    /// Always refetch on read, keep for 5 minutes.
    pub const DEFAULT: StalePolicy = StalePolicy::new(secs(0), secs(5 * 60));

    // Transactions - lists change with every create/update
    pub const TRANSACTION_LIST: StalePolicy = StalePolicy::new(secs(30), secs(5 * 60));
    pub const TRANSACTION_STATS: StalePolicy = StalePolicy::new(secs(60), secs(5 * 60));
    pub const TRANSACTION_DETAIL: StalePolicy = StalePolicy::DEFAULT;

    // Models - only change on reload
    pub const FRAUD_MODEL_STATUS: StalePolicy = StalePolicy::new(secs(2 * 60), secs(5 * 60));
    pub const IMAGE_MODEL_STATUS: StalePolicy =
        StalePolicy::new(secs(5 * 60), secs(5 * 60)).polling(secs(30));

    // Profile
    pub const PROFILE: StalePolicy = StalePolicy::new(secs(5 * 60), secs(10 * 60));

    // System
    pub const PRESENTATION: StalePolicy = StalePolicy::new(secs(30 * 60), secs(60 * 60));
    pub const HEALTH: StalePolicy = StalePolicy::new(secs(60), secs(5 * 60)).polling(secs(30));
    pub const DEBUG_MODEL_STATUS: StalePolicy = StalePolicy::new(secs(5 * 60), secs(10 * 60));
}

impl Default for StalePolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}
