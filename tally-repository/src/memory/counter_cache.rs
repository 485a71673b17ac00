use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::{CounterCache, RepositoryError};

/// Keys returned per emulated `SCAN` round trip.
const SCAN_BATCH: usize = 10;

/// Sentinel for "scans never fail".
const SCAN_NEVER_FAILS: usize = usize::MAX;

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: i64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| deadline > now)
    }
}

/// In-memory [`CounterCache`].
///
/// `set_available(false)` makes every call fail the way an unreachable Redis
/// would; `set_writes_failing(true)` fails only the counter updates, and
/// `fail_scan_after` drops the connection partway through a key scan.
#[derive(Clone)]
pub struct MemoryCounterCache {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    available: Arc<AtomicBool>,
    writes_failing: Arc<AtomicBool>,
    scan_fail_after: Arc<AtomicUsize>,
}

impl Default for MemoryCounterCache {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            available: Arc::new(AtomicBool::new(true)),
            writes_failing: Arc::new(AtomicBool::new(false)),
            scan_fail_after: Arc::new(AtomicUsize::new(SCAN_NEVER_FAILS)),
        }
    }
}

impl MemoryCounterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_writes_failing(&self, failing: bool) {
        self.writes_failing.store(failing, Ordering::SeqCst);
    }

    /// Makes the next scan fail after `batches` successful round trips of
    /// ten keys each.
    pub fn fail_scan_after(&self, batches: usize) {
        self.scan_fail_after.store(batches, Ordering::SeqCst);
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, RepositoryError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(RepositoryError::unavailable("counter cache is not reachable"));
        }
        self.entries
            .lock()
            .map_err(|_| RepositoryError::unavailable("counter cache lock poisoned"))
    }

    fn add(&self, key: &str, amount: i64) -> Result<i64, RepositoryError> {
        if self.writes_failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::unavailable("counter write rejected"));
        }
        let mut entries = self.entries()?;
        let now = Instant::now();
        let entry = entries.entry(key.to_string()).or_insert(Entry {
            value: 0,
            expires_at: None,
        });
        if !entry.is_live(now) {
            *entry = Entry {
                value: 0,
                expires_at: None,
            };
        }
        entry.value += amount;
        Ok(entry.value)
    }
}

/// Glob match supporting `*` only.
fn glob_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return text.is_empty();
    };
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };
    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(index) => rest = &rest[index + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

#[async_trait]
impl CounterCache for MemoryCounterCache {
    async fn get(&self, key: &str) -> Result<Option<i64>, RepositoryError> {
        let entries = self.entries()?;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value))
    }

    async fn exists(&self, key: &str) -> Result<bool, RepositoryError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn set(&self, key: &str, value: i64, ttl: Option<Duration>) -> Result<(), RepositoryError> {
        let mut entries = self.entries()?;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: i64) -> Result<bool, RepositoryError> {
        let mut entries = self.entries()?;
        let now = Instant::now();
        if entries.get(key).is_some_and(|entry| entry.is_live(now)) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: None,
            },
        );
        Ok(true)
    }

    async fn incr(&self, key: &str) -> Result<i64, RepositoryError> {
        self.add(key, 1)
    }

    async fn decr(&self, key: &str) -> Result<i64, RepositoryError> {
        self.add(key, -1)
    }

    async fn add_if_present(&self, key: &str, delta: i64) -> Result<Option<i64>, RepositoryError> {
        if self.writes_failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::unavailable("counter write rejected"));
        }
        let mut entries = self.entries()?;
        let now = Instant::now();
        Ok(entries
            .get_mut(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| {
                entry.value += delta;
                entry.value
            }))
    }

    async fn scan_match(&self, pattern: &str) -> Result<Vec<String>, RepositoryError> {
        let mut live: Vec<String> = {
            let entries = self.entries()?;
            let now = Instant::now();
            entries
                .iter()
                .filter(|(_, entry)| entry.is_live(now))
                .map(|(key, _)| key.clone())
                .collect()
        };
        live.sort();

        let fail_after = self.scan_fail_after.swap(SCAN_NEVER_FAILS, Ordering::SeqCst);
        let mut keys = Vec::new();
        for (round, batch) in live.chunks(SCAN_BATCH).enumerate() {
            if round >= fail_after {
                return Err(RepositoryError::unavailable(format!(
                    "connection dropped after {round} scan batches"
                )));
            }
            keys.extend(batch.iter().filter(|key| glob_match(pattern, key)).cloned());
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("community:*:member_count", "community:abc:member_count"));
        assert!(!glob_match("community:*:member_count", "community:abc:posts"));
        assert!(!glob_match("community:*:member_count", "user:abc:member_count"));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
    }

    #[tokio::test]
    async fn test_incr_on_missing_key_starts_at_zero() {
        let cache = MemoryCounterCache::new();
        assert_eq!(cache.incr("k").await.unwrap(), 1);
        assert_eq!(cache.decr("k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_if_absent_keeps_existing_value() {
        let cache = MemoryCounterCache::new();
        assert!(cache.set_if_absent("k", 7).await.unwrap());
        cache.incr("k").await.unwrap();
        assert!(!cache.set_if_absent("k", 7).await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), Some(8));
    }

    #[tokio::test]
    async fn test_expired_entries_are_absent() {
        let cache = MemoryCounterCache::new();
        cache.set("k", 3, Some(Duration::ZERO)).await.unwrap();
        assert!(!cache.exists("k").await.unwrap());
        assert!(cache.scan_match("*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_if_present_never_creates_key() {
        let cache = MemoryCounterCache::new();
        assert_eq!(cache.add_if_present("k", 1).await.unwrap(), None);
        assert!(!cache.exists("k").await.unwrap());

        cache.set("k", 7, None).await.unwrap();
        assert_eq!(cache.add_if_present("k", 1).await.unwrap(), Some(8));
        assert_eq!(cache.add_if_present("k", -2).await.unwrap(), Some(6));
    }

    #[tokio::test]
    async fn test_scan_failure_midway_is_an_error() {
        let cache = MemoryCounterCache::new();
        for i in 0..25 {
            cache.set(&format!("community:{i:02}:member_count"), i, None).await.unwrap();
        }

        cache.fail_scan_after(1);
        let result = cache.scan_match("community:*:member_count").await;
        assert!(matches!(result, Err(RepositoryError::Unavailable(_))));

        let keys = cache.scan_match("community:*:member_count").await.unwrap();
        assert_eq!(keys.len(), 25);
    }

    #[tokio::test]
    async fn test_unavailable_cache_fails_every_call() {
        let cache = MemoryCounterCache::new();
        cache.set_available(false);
        assert!(matches!(cache.get("k").await, Err(RepositoryError::Unavailable(_))));
        assert!(cache.incr("k").await.is_err());
        cache.set_available(true);
        assert_eq!(cache.incr("k").await.unwrap(), 1);
    }
}
