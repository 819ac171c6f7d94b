use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::{RwLock, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::clock::Clock;
use crate::error::CacheError;

/// Cache key for a completion: topic and prompt only, so the same question
/// on the same topic hits even after the history has grown.
pub fn fingerprint(topic_id: &str, prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update((topic_id.len() as u64).to_be_bytes());
    hasher.update(topic_id.as_bytes());
    hasher.update(prompt.as_bytes());
    hex::encode(hasher.finalize())
}

/// Key/value store for completion payloads with per-entry expiry.
///
/// Advisory only: callers treat any error as a miss.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// `None` when missing or expired
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Overwrites any existing entry
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}

struct CachedEntry {
    value: String,
    /// Unix timestamp (milliseconds)
    expires_at: i64,
}

impl CachedEntry {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at < now
    }
}

/// In-process `ResponseCache` with lazy eviction on read and an optional
/// background sweep.
pub struct MemoryResponseCache {
    entries: RwLock<HashMap<String, CachedEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryResponseCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Number of stored entries, expired ones included
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Drop every expired entry, returning how many were removed
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Run `sweep` every `interval` until the returned handle is stopped or
    /// dropped, or the cache itself is dropped.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) -> SweepHandle {
        let cache = Arc::downgrade(self);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_sweeper(cache, interval, shutdown_rx));
        SweepHandle {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }
}

async fn run_sweeper(
    cache: Weak<MemoryResponseCache>,
    interval: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => {
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let removed = cache.sweep().await;
                if removed > 0 {
                    debug!(removed, "swept expired cache entries");
                }
            }
        }
    }
    debug!("cache sweeper stopped");
}

#[async_trait]
impl ResponseCache for MemoryResponseCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = self.clock.now_millis();

        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Expired: evict, unless a writer refreshed it in the meantime.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.value.clone()));
            }
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = self.clock.now_millis().saturating_add(ttl_ms);
        self.entries
            .write()
            .await
            .insert(key.to_string(), CachedEntry { value, expires_at });
        Ok(())
    }
}

/// Handle to the background sweep task
pub struct SweepHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SweepHandle {
    /// Stop the sweeper and wait for it to exit
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|t| t.is_finished())
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn cache() -> (Arc<ManualClock>, Arc<MemoryResponseCache>) {
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(MemoryResponseCache::new(clock.clone()));
        (clock, cache)
    }

    #[test]
    fn test_fingerprint_is_deterministic_and_scoped() {
        let a = fingerprint("acme/repo#42", "fix tax bug");
        assert_eq!(a, fingerprint("acme/repo#42", "fix tax bug"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, fingerprint("acme/repo#43", "fix tax bug"));
        assert_ne!(fingerprint("ab", "c"), fingerprint("a", "bc"));
    }

    #[tokio::test]
    async fn test_get_within_ttl() {
        let (clock, cache) = cache();
        cache.set("k", "v".to_string(), Duration::from_secs(10)).await.unwrap();

        clock.advance(Duration::from_secs(10));
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_expired_entry_is_removed_on_read() {
        let (clock, cache) = cache();
        cache.set("k", "v".to_string(), Duration::from_secs(10)).await.unwrap();

        clock.advance(Duration::from_millis(10_001));
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_overwrites_and_refreshes_expiry() {
        let (clock, cache) = cache();
        cache.set("k", "old".to_string(), Duration::from_secs(5)).await.unwrap();
        clock.advance(Duration::from_secs(4));
        cache.set("k", "new".to_string(), Duration::from_secs(5)).await.unwrap();
        clock.advance(Duration::from_secs(4));

        assert_eq!(cache.get("k").await.unwrap(), Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let (clock, cache) = cache();
        cache.set("short", "a".to_string(), Duration::from_secs(1)).await.unwrap();
        cache.set("long", "b".to_string(), Duration::from_secs(100)).await.unwrap();

        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.sweep().await, 1);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("long").await.unwrap(), Some("b".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_periodically_and_stops() {
        let (clock, cache) = cache();
        cache.set("k", "v".to_string(), Duration::from_secs(1)).await.unwrap();
        clock.advance(Duration::from_secs(2));

        let handle = cache.start_sweeper(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;
        assert!(cache.is_empty().await);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_exits_when_cache_dropped() {
        let (_clock, cache) = cache();
        let handle = cache.start_sweeper(Duration::from_secs(1));
        drop(cache);

        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert!(handle.is_finished());
    }
}
