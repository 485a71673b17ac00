use std::time::Duration;

use async_trait::async_trait;

use crate::errors::RepositoryError;

/// Key-value store of integer counters.
///
/// Every operation is atomic at the adapter.
#[async_trait]
pub trait CounterCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<i64>, RepositoryError>;

    async fn exists(&self, key: &str) -> Result<bool, RepositoryError>;

    /// Stores `value`, expiring after `ttl` or never when `ttl` is `None`.
    async fn set(&self, key: &str, value: i64, ttl: Option<Duration>) -> Result<(), RepositoryError>;

    /// Stores `value` without expiry only if `key` is absent. Returns whether
    /// the write happened.
    async fn set_if_absent(&self, key: &str, value: i64) -> Result<bool, RepositoryError>;

    async fn incr(&self, key: &str) -> Result<i64, RepositoryError>;

    async fn decr(&self, key: &str) -> Result<i64, RepositoryError>;

    /// Adds `delta` to `key` only if it exists, returning the new value.
    ///
    /// Returns `None` without creating the key when it is absent, so a counter
    /// lost to eviction or a flush is never restarted from zero.
    async fn add_if_present(&self, key: &str, delta: i64) -> Result<Option<i64>, RepositoryError>;

    /// Lists keys matching a glob pattern where `*` matches any run of
    /// characters.
    async fn scan_match(&self, pattern: &str) -> Result<Vec<String>, RepositoryError>;
}
