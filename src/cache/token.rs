use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Cached token for one tenant key (project id)
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub token: String,
    pub expires_at: Instant,
    /// bumped on every store, lets a stale timer recognize it was superseded
    pub(crate) generation: u64,
}

impl CacheEntry {
    pub fn new(key: String, token: String, expires_at: Instant, generation: u64) -> Self {
        Self { key, token, expires_at, generation }
    }

    /// Strictly before `expires_at`.
    pub fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Pending proactive removal of a cache entry
#[derive(Debug)]
pub struct ScheduledInvalidation {
    pub(crate) generation: u64,
    pub(crate) handle: JoinHandle<()>,
}

impl ScheduledInvalidation {
    pub fn cancel(self) {
        self.handle.abort();
    }
}
