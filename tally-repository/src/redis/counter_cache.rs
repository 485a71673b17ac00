//! # Redis
//!
//! In-memory store for the per-community member counters.
//!
//! - Plain string keys holding integers, `INCR`/`DECR` for atomic updates
//! - Seeding uses `SET NX` so a late seed never overwrites earlier increments
//! - Engine updates go through a script that only touches existing keys
//! - Key enumeration walks the `SCAN MATCH` cursor, never `KEYS`
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use tracing::debug;

use crate::{CounterCache, RepositoryError};

/// Keys requested per `SCAN` round trip.
const SCAN_BATCH: usize = 500;

/// `INCRBY` that leaves an absent key absent and returns nil for it.
const ADD_IF_PRESENT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return redis.call('INCRBY', KEYS[1], ARGV[1])
end
return false
"#;

/// [`CounterCache`] over a multiplexed, auto-reconnecting Redis connection.
#[derive(Clone)]
pub struct RedisCounterCache {
    conn: ConnectionManager,
    add_if_present: Script,
}

impl RedisCounterCache {
    /// Connects to Redis and prepares the counter scripts.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Connection URL, e.g. `redis://127.0.0.1:6379`
    /// * `connect_timeout` - Upper bound on establishing the first connection
    ///
    /// # Returns
    ///
    /// * `Ok(RedisCounterCache)` - Connected cache
    /// * `Err(RepositoryError::Unavailable)` - The connection timed out
    /// * `Err(RepositoryError::Cache)` - Invalid URL or connection refused
    pub async fn connect(redis_url: &str, connect_timeout: Duration) -> Result<Self, RepositoryError> {
        let client = Client::open(redis_url)?;
        let conn = tokio::time::timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                RepositoryError::unavailable(format!(
                    "timed out after {}ms connecting to redis",
                    connect_timeout.as_millis()
                ))
            })??;
        debug!("Redis counter cache connected");
        Ok(Self::from_connection(conn))
    }

    /// Wraps an existing connection manager.
    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self {
            conn,
            add_if_present: Script::new(ADD_IF_PRESENT),
        }
    }
}

#[async_trait]
impl CounterCache for RedisCounterCache {
    async fn get(&self, key: &str) -> Result<Option<i64>, RepositoryError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn exists(&self, key: &str) -> Result<bool, RepositoryError> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(key).await?)
    }

    async fn set(&self, key: &str, value: i64, ttl: Option<Duration>) -> Result<(), RepositoryError> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: i64) -> Result<bool, RepositoryError> {
        let mut conn = self.conn.clone();
        Ok(conn.set_nx(key, value).await?)
    }

    async fn incr(&self, key: &str) -> Result<i64, RepositoryError> {
        let mut conn = self.conn.clone();
        Ok(conn.incr(key, 1).await?)
    }

    async fn decr(&self, key: &str) -> Result<i64, RepositoryError> {
        let mut conn = self.conn.clone();
        Ok(conn.decr(key, 1).await?)
    }

    async fn add_if_present(&self, key: &str, delta: i64) -> Result<Option<i64>, RepositoryError> {
        let mut conn = self.conn.clone();
        let count: Option<i64> = self
            .add_if_present
            .key(key)
            .arg(delta)
            .invoke_async(&mut conn)
            .await?;
        Ok(count)
    }

    /// Walks the whole `SCAN` cursor. An error on any round trip fails the
    /// scan instead of returning the keys collected so far.
    async fn scan_match(&self, pattern: &str) -> Result<Vec<String>, RepositoryError> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .cursor_arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once
        keys.sort();
        keys.dedup();
        debug!(pattern, keys = keys.len(), "Scanned counter keys");
        Ok(keys)
    }
}
