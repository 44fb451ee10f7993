//! In-memory access token cache keyed by project id.
//!
//! Two independent expiry mechanisms are kept:
//! - every entry gets a scheduled invalidation that fires `refresh_buffer`
//!   before nominal expiry and drops the entry
//! - every read compares `expires_at` with now and drops stale entries
//!
//! `cleanup_expired_tokens` is an additional manual sweep for entries whose
//! timer never fired.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Weak};

use futures::future::join_all;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::cache::token::{CacheEntry, ScheduledInvalidation};
use crate::observability::metrics::get_metrics;
use crate::resilience::retry::BackoffPolicy;

pub const TOKEN_EXPIRY: Duration = Duration::from_secs(60 * 60);
pub const REFRESH_BUFFER: Duration = Duration::from_secs(5 * 60);

static REASON_SCHEDULED: &str = "scheduled";
static REASON_EXPIRED: &str = "expired";
static REASON_EXPLICIT: &str = "explicit";

#[derive(Debug, Clone, Copy)]
pub struct TokenCacheSettings {
    /// when false tokens are generated (with retries) on every call and never stored
    pub enabled: bool,
    pub token_expiry: Duration,
    pub refresh_buffer: Duration,
    pub backoff: BackoffPolicy,
}

impl Default for TokenCacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            token_expiry: TOKEN_EXPIRY,
            refresh_buffer: REFRESH_BUFFER,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl TokenCacheSettings {
    /// Delay after a store at which the entry is proactively dropped.
    pub fn invalidate_after(&self) -> Duration {
        self.token_expiry.saturating_sub(self.refresh_buffer)
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    retries: HashMap<String, u32>,
    invalidations: HashMap<String, ScheduledInvalidation>,
    next_generation: u64,
}

impl CacheState {
    fn remove_entry(&mut self, key: &str) -> bool {
        if let Some(scheduled) = self.invalidations.remove(key) {
            scheduled.cancel();
        }
        self.entries.remove(key).is_some()
    }
}

#[derive(Debug)]
struct Inner {
    settings: TokenCacheSettings,
    state: Mutex<CacheState>,
}

/// Process-wide token cache handle. Build one at startup and clone it
/// into every consumer; clones share the same state.
#[derive(Debug, Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

impl Default for TokenManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenManager {
    pub fn new() -> Self {
        Self::with_settings(TokenCacheSettings::default())
    }

    pub fn with_settings(settings: TokenCacheSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    /// Return a valid token for `key`, generating one when the cache has none.
    ///
    /// A failed generation is retried with exponential backoff until the
    /// per-key failure counter reaches `max_attempts`; the last generator
    /// error is then returned as is. The counter survives across calls and
    /// is reset only by a successful generation.
    ///
    /// Concurrent calls for the same uncached key each run `generate`; the
    /// last store wins.
    pub async fn get_token<F, Fut, E>(&self, key: &str, mut generate: F) -> Result<String, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, E>>,
        E: Display,
    {
        let metrics = get_metrics().await;
        if let Some(token) = self.cached_token(key).await {
            metrics.token_cache_hits.with_label_values(&[key]).inc();
            debug!("token cache hit for project '{}'", key);
            return Ok(token);
        }
        metrics.token_cache_misses.with_label_values(&[key]).inc();

        let backoff = self.inner.settings.backoff;
        let mut last_error = match self.generate_and_store(key, &mut generate).await {
            Ok(token) => return Ok(token),
            Err(err) => err,
        };

        loop {
            let failures = self.record_failure(key).await;
            if backoff.is_exhausted(failures) {
                error!("token generation for project '{}' gave up after {} failures: {}", key, failures, last_error);
                return Err(last_error);
            }
            let delay = backoff.delay_for(failures);
            warn!("token generation for project '{}' failed ({}/{}): {}, retrying in {:?}", key, failures, backoff.max_attempts, last_error, delay);
            sleep(delay).await;

            match self.generate_and_store(key, &mut generate).await {
                Ok(token) => return Ok(token),
                Err(err) => last_error = err,
            }
        }
    }

    /// Read the cached token without generating; stale entries are dropped.
    pub async fn cached_token(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut state = self.inner.state.lock().await;
        let fresh = state.entries.get(key).map(|entry| entry.is_fresh(now))?;
        if fresh {
            return state.entries.get(key).map(|entry| entry.token.to_owned());
        }

        state.remove_entry(key);
        let remaining = state.entries.len();
        drop(state);
        debug!("cached token for project '{}' expired on read", key);
        let metrics = get_metrics().await;
        metrics.token_invalidations.with_label_values(&[REASON_EXPIRED]).inc();
        metrics.cached_tokens.set(remaining as i64);
        None
    }

    /// Drop every entry whose `expires_at` has passed, cancelling its timer.
    /// Returns the number of removed entries.
    pub async fn cleanup_expired_tokens(&self) -> usize {
        let now = Instant::now();
        let mut state = self.inner.state.lock().await;
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh(now))
            .map(|(key, _)| key.to_owned())
            .collect();

        for key in &expired {
            state.remove_entry(key);
        }
        let remaining = state.entries.len();
        drop(state);

        if !expired.is_empty() {
            info!("removed {} expired tokens: {:?}", expired.len(), expired);
            let metrics = get_metrics().await;
            metrics.token_invalidations.with_label_values(&[REASON_EXPIRED]).inc_by(expired.len() as u64);
            metrics.cached_tokens.set(remaining as i64);
        }
        expired.len()
    }

    /// Pre-warm the cache for several projects concurrently. A failure for
    /// one project is logged and does not affect the others.
    pub async fn initialize_projects<I, S, F, Fut, E>(&self, keys: I, generate: F)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<String, E>>,
        E: Display,
    {
        let metrics = get_metrics().await;
        let tasks = keys.into_iter().map(|key| {
            let key: String = key.into();
            let pending = generate(key.clone());
            async move {
                metrics.token_generation_attempts.with_label_values(&[key.as_str()]).inc();
                match pending.await {
                    Ok(token) => {
                        self.store(&key, token).await;
                        info!("token initialized for project '{}'", key);
                        true
                    }
                    Err(err) => {
                        metrics.token_generation_failures.with_label_values(&[key.as_str()]).inc();
                        error!("failed to initialize token for project '{}': {}", key, err);
                        false
                    }
                }
            }
        });

        let outcomes = join_all(tasks).await;
        let initialized = outcomes.iter().filter(|ok| **ok).count();
        info!("initialized tokens for {}/{} projects", initialized, outcomes.len());
    }

    /// Drop the entry for `key` (e.g. after the provider rejected the token).
    pub async fn invalidate(&self, key: &str) -> bool {
        let mut state = self.inner.state.lock().await;
        let removed = state.remove_entry(key);
        let remaining = state.entries.len();
        drop(state);
        if removed {
            let metrics = get_metrics().await;
            metrics.token_invalidations.with_label_values(&[REASON_EXPLICIT]).inc();
            metrics.cached_tokens.set(remaining as i64);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Consecutive failed generations recorded for `key`.
    pub async fn retry_attempts(&self, key: &str) -> u32 {
        let state = self.inner.state.lock().await;
        state.retries.get(key).copied().unwrap_or(0)
    }

    async fn generate_and_store<F, Fut, E>(&self, key: &str, generate: &mut F) -> Result<String, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        let metrics = get_metrics().await;
        metrics.token_generation_attempts.with_label_values(&[key]).inc();
        match generate().await {
            Ok(token) => {
                self.store(key, token.clone()).await;
                Ok(token)
            }
            Err(err) => {
                metrics.token_generation_failures.with_label_values(&[key]).inc();
                Err(err)
            }
        }
    }

    async fn record_failure(&self, key: &str) -> u32 {
        let mut state = self.inner.state.lock().await;
        let failures = state.retries.entry(key.to_owned()).or_insert(0);
        *failures = failures.saturating_add(1);
        *failures
    }

    /// Store a freshly generated token, reset the failure counter and
    /// replace the scheduled invalidation for `key`.
    async fn store(&self, key: &str, token: String) {
        let settings = self.inner.settings;
        let mut state = self.inner.state.lock().await;
        state.retries.insert(key.to_owned(), 0);
        if !settings.enabled {
            return;
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let expires_at = Instant::now() + settings.token_expiry;
        state.entries.insert(
            key.to_owned(),
            CacheEntry::new(key.to_owned(), token, expires_at, generation),
        );

        let handle = spawn_invalidation(
            Arc::downgrade(&self.inner),
            key.to_owned(),
            generation,
            settings.invalidate_after(),
        );
        let scheduled = ScheduledInvalidation { generation, handle };
        if let Some(previous) = state.invalidations.insert(key.to_owned(), scheduled) {
            previous.cancel();
        }
        let cached = state.entries.len();
        drop(state);

        debug!("token cached for project '{}', invalidation in {:?}", key, settings.invalidate_after());
        get_metrics().await.cached_tokens.set(cached as i64);
    }

    /// Called by the timer task; ignores entries stored after it was scheduled.
    async fn fire_invalidation(&self, key: &str, generation: u64) {
        let mut state = self.inner.state.lock().await;
        let current = state
            .invalidations
            .get(key)
            .map_or(false, |scheduled| scheduled.generation == generation);
        if !current {
            return;
        }
        // the running task owns this handle, dropping it does not abort
        state.invalidations.remove(key);
        let removed = state
            .entries
            .get(key)
            .filter(|entry| entry.generation == generation)
            .is_some();
        if removed {
            state.entries.remove(key);
        }
        let remaining = state.entries.len();
        drop(state);

        if removed {
            debug!("scheduled invalidation dropped token for project '{}'", key);
            let metrics = get_metrics().await;
            metrics.token_invalidations.with_label_values(&[REASON_SCHEDULED]).inc();
            metrics.cached_tokens.set(remaining as i64);
        }
    }

    #[cfg(test)]
    pub(crate) async fn insert_unscheduled(&self, key: &str, token: &str, expires_at: Instant) {
        let mut state = self.inner.state.lock().await;
        state.next_generation += 1;
        let generation = state.next_generation;
        state.entries.insert(
            key.to_owned(),
            CacheEntry::new(key.to_owned(), token.to_owned(), expires_at, generation),
        );
    }

    #[cfg(test)]
    pub(crate) async fn has_scheduled_invalidation(&self, key: &str) -> bool {
        self.inner.state.lock().await.invalidations.contains_key(key)
    }

    #[cfg(test)]
    pub(crate) async fn entry_generation(&self, key: &str) -> Option<u64> {
        self.inner.state.lock().await.entries.get(key).map(|entry| entry.generation)
    }

    /// Run the timer body for `generation` immediately.
    #[cfg(test)]
    pub(crate) async fn fire_invalidation_now(&self, key: &str, generation: u64) {
        self.fire_invalidation(key, generation).await;
    }
}

fn spawn_invalidation(
    inner: Weak<Inner>,
    key: String,
    generation: u64,
    delay: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        sleep(delay).await;
        if let Some(inner) = inner.upgrade() {
            TokenManager { inner }.fire_invalidation(&key, generation).await;
        }
    })
}
