//! In-process reference implementation of the shared store.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time::sleep;

use crate::store::{SharedStore, StoreError};

struct CounterCell {
    count: u64,
    window_ends: Instant,
}

struct ValueCell {
    value: String,
    expires: Option<Instant>,
}

impl ValueCell {
    fn live(&self, now: Instant) -> bool {
        self.expires.map_or(true, |at| now < at)
    }
}

/// DashMap-backed store with per-key atomicity.
///
/// The entry API holds the shard lock for the whole read-modify-write, so
/// increment-and-check is atomic under concurrent bursts against the same
/// key. Expired entries are dropped lazily on read and collected by the
/// periodic sweep.
#[derive(Default)]
pub struct MemoryStore {
    counters: DashMap<String, CounterCell>,
    kv: DashMap<String, ValueCell>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired counter and value.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.counters.len() + self.kv.len();
        self.counters.retain(|_, cell| now < cell.window_ends);
        self.kv.retain(|_, cell| cell.live(now));
        before - (self.counters.len() + self.kv.len())
    }

    /// Periodic sweep loop; runs until shutdown.
    pub async fn run_sweeper(&self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                _ = sleep(interval) => {
                    let dropped = self.sweep();
                    if dropped > 0 {
                        tracing::debug!(dropped, "Swept expired store entries");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Store sweeper stopping");
                    break;
                }
            }
        }
    }
}

impl SharedStore for MemoryStore {
    fn increment(&self, key: &str, window: Duration) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut cell = self
            .counters
            .entry(key.to_string())
            .or_insert_with(|| CounterCell {
                count: 0,
                window_ends: now + window,
            });
        if now >= cell.window_ends {
            // Fixed-window reset: expired counter starts a fresh window.
            cell.count = 0;
            cell.window_ends = now + window;
        }
        cell.count += 1;
        Ok(cell.count)
    }

    fn counter(&self, key: &str) -> Result<u64, StoreError> {
        match self.counters.get(key) {
            Some(cell) if Instant::now() < cell.window_ends => Ok(cell.count),
            _ => Ok(0),
        }
    }

    fn reset(&self, key: &str) -> Result<(), StoreError> {
        self.counters.remove(key);
        Ok(())
    }

    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.kv.insert(
            key.to_string(),
            ValueCell {
                value: value.to_string(),
                expires: ttl.map(|t| Instant::now() + t),
            },
        );
        Ok(())
    }

    fn fetch(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        Ok(self
            .kv
            .get(key)
            .filter(|cell| cell.live(now))
            .map(|cell| cell.value.clone()))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.kv.remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        let now = Instant::now();
        Ok(self
            .kv
            .iter()
            .filter(|entry| entry.key().starts_with(prefix) && entry.value().live(now))
            .map(|entry| (entry.key().clone(), entry.value().value.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_increment_and_read() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(60);

        assert_eq!(store.increment("k", window).unwrap(), 1);
        assert_eq!(store.increment("k", window).unwrap(), 2);
        assert_eq!(store.counter("k").unwrap(), 2);
        assert_eq!(store.counter("other").unwrap(), 0);

        store.reset("k").unwrap();
        assert_eq!(store.counter("k").unwrap(), 0);
    }

    #[test]
    fn test_window_expiry_resets_counter() {
        let store = MemoryStore::new();
        let window = Duration::from_millis(50);

        for _ in 0..5 {
            store.increment("k", window).unwrap();
        }
        assert_eq!(store.counter("k").unwrap(), 5);

        std::thread::sleep(Duration::from_millis(80));

        // Idle past the window: reads back as zero, and the next increment
        // starts a fresh window at 1, not 6.
        assert_eq!(store.counter("k").unwrap(), 0);
        assert_eq!(store.increment("k", window).unwrap(), 1);
    }

    #[test]
    fn test_concurrent_increments_lose_no_updates() {
        let store = Arc::new(MemoryStore::new());
        let window = Duration::from_secs(60);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store.increment("burst", window).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.counter("burst").unwrap(), 800);
    }

    #[test]
    fn test_kv_ttl() {
        let store = MemoryStore::new();

        store.put("a", "1", None).unwrap();
        store.put("b", "2", Some(Duration::from_millis(40))).unwrap();
        assert_eq!(store.fetch("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.fetch("b").unwrap().as_deref(), Some("2"));

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(store.fetch("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.fetch("b").unwrap(), None);

        store.remove("a").unwrap();
        assert_eq!(store.fetch("a").unwrap(), None);
    }

    #[test]
    fn test_scan_prefix_skips_expired() {
        let store = MemoryStore::new();
        store.put("block:1.2.3.4", "x", None).unwrap();
        store
            .put("block:5.6.7.8", "y", Some(Duration::from_millis(30)))
            .unwrap();
        store.put("other:9", "z", None).unwrap();

        std::thread::sleep(Duration::from_millis(50));
        let entries = store.scan_prefix("block:").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "block:1.2.3.4");
    }

    #[test]
    fn test_sweep_drops_expired() {
        let store = MemoryStore::new();
        store.increment("c", Duration::from_millis(20)).unwrap();
        store.put("v", "x", Some(Duration::from_millis(20))).unwrap();
        store.put("keep", "x", None).unwrap();

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(store.sweep(), 2);
        assert_eq!(store.fetch("keep").unwrap().as_deref(), Some("x"));
    }
}
