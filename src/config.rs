use std::time::Duration;

/// Tuning knobs for the outbox dispatcher.
///
/// The polling interval doubles as the retry backoff: a failed record is
/// simply eligible again on the next cycle, and `max_retries` bounds how
/// many cycles will try it before it is parked for operator inspection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Publish attempts before a record is parked as poison.
    pub max_retries: u32,
    /// Maximum records claimed per drain cycle.
    pub batch_size: usize,
    /// Delay between drain cycles.
    pub poll_interval: Duration,
    /// How long a claim lease lasts before another dispatcher instance may
    /// reclaim the record.
    pub claim_lease: Duration,
    /// Processed records older than this many days are purged by cleanup.
    pub cleanup_retention_days: u32,
    /// How often the background thread runs cleanup.
    pub cleanup_every: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            batch_size: 100,
            poll_interval: Duration::from_secs(5),
            claim_lease: Duration::from_secs(60),
            cleanup_retention_days: 7,
            cleanup_every: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl DispatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    pub fn with_cleanup_retention_days(mut self, days: u32) -> Self {
        self.cleanup_retention_days = days;
        self
    }

    pub fn with_cleanup_every(mut self, every: Duration) -> Self {
        self.cleanup_every = every;
        self
    }
}
