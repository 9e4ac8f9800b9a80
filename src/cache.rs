//! Expiring key→value store for enrichment results.
//!
//! Read-mostly: enrichment lookups vastly outnumber writes, so the map sits
//! behind an `RwLock`. Expired entries behave as absent on read even before
//! the background sweep physically removes them.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Generic TTL cache shared across all workers and sessions.
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Store `value` under `key`, overwriting any prior entry. The entry
    /// expires `ttl` from now.
    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Look up `key`. Returns `None` for absent keys and for entries whose
    /// expiry has passed, whether or not the sweep has removed them yet.
    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(key)?;
        if Instant::now() >= entry.expires_at {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Remove all expired entries. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    /// Number of physically stored entries, expired or not.
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the periodic eviction sweep.
///
/// Runs until `cancel` fires, so tests and shutdown paths can stop it
/// deterministically.
pub fn spawn_sweep_task<V>(
    cache: Arc<TtlCache<V>>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!("Cache sweep task started, interval {:?}", interval);
        let mut tick = tokio::time::interval(interval);
        tick.tick().await; // the first tick fires immediately, skip it
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Cache sweep task shutting down");
                    return;
                }
                _ = tick.tick() => {
                    let removed = cache.sweep();
                    if removed > 0 {
                        debug!(removed, "Swept expired cache entries");
                    }
                }
            }
        }
    })
}
