use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::debug;

use crate::metrics::CACHE_SIZE;
use crate::models::{Endpoint, GenerationRequest, GenerationResponse};

// Completions older than this are never served
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

// Cache key (hash of endpoint + every request field)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for `req` sent to `endpoint`.
    ///
    /// Each field is rendered with its `Debug` form, so strings are quoted and
    /// escaped and an unset field (`None`) never equals an explicit value.
    /// The rendered fields are joined with `|` and hashed.
    pub fn new(endpoint: Endpoint, req: &GenerationRequest) -> Self {
        let canonical = [
            endpoint.path().to_string(),
            format!("{:?}", req.prompt),
            format!("{:?}", req.length),
            float_field(req.temperature),
            format!("{:?}", req.model),
            format!("{:?}", req.top_k),
            float_field(req.top_p),
            float_field(req.repetition_penalty),
        ]
        .join("|");

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        CacheKey(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// -0.0 == 0.0, so both must render the same
fn float_field(value: Option<f64>) -> String {
    let value = value.map(|v| if v == 0.0 { 0.0 } else { v });
    format!("{:?}", value)
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Cache entry with timestamp
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub response: GenerationResponse,
    // wall clock, epoch millis
    pub timestamp: i64,
    created_at: Instant,
}

impl CacheEntry {
    fn new(response: GenerationResponse) -> Self {
        Self {
            response,
            timestamp: chrono::Utc::now().timestamp_millis(),
            created_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    // usable for a lookup
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }

    // eligible for eviction
    fn is_expired(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }
}

/// Completed responses keyed by request, valid for one TTL.
///
/// Entries are only ever replaced wholesale. Lookups check the age
/// themselves, so the periodic sweep only bounds memory.
pub struct ResponseCache {
    entries: DashMap<CacheKey, CacheEntry>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // Fresh entry for `key`, if any. Returns a copy so no shard lock
    // outlives the call.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.get(key)?;
        if entry.is_fresh(self.ttl) {
            Some(entry.clone())
        } else {
            None
        }
    }

    // Store a completed response, replacing any previous entry for the key
    pub fn insert(&self, key: CacheKey, response: GenerationResponse) {
        self.entries.insert(key, CacheEntry::new(response));
        CACHE_SIZE.set(self.entries.len() as f64);
    }

    /// Evict every expired entry and return how many were removed.
    pub fn sweep(&self) -> usize {
        let ttl = self.ttl;
        let mut evicted = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(ttl);
            if !keep {
                evicted += 1;
            }
            keep
        });
        CACHE_SIZE.set(self.entries.len() as f64);
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run `sweep` once per TTL in the background.
    ///
    /// The task holds only a weak reference and ends once the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);
        // interval panics on a zero period
        let period = self.ttl.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            debug!("Cache sweeper started (interval: {:?})", period);

            loop {
                ticker.tick().await;

                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let evicted = cache.sweep();
                if evicted > 0 {
                    debug!(evicted, remaining = cache.len(), "swept expired completions");
                }
            }
            debug!("Cache dropped, sweeper stopped");
        })
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
