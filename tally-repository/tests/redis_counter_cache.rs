//! Integration tests for the Redis counter cache.
//!
//! These tests require a real Redis server. Every key is namespaced per run
//! and written with a short TTL so nothing is left behind.
//!
//! Run with: `REDIS_URL=redis://.. cargo test --test redis_counter_cache -- --ignored`

use std::time::Duration;

use tally_repository::{CounterCache, RedisCounterCache};
use uuid::Uuid;

const KEY_TTL: Duration = Duration::from_secs(60);

async fn connect() -> RedisCounterCache {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    RedisCounterCache::connect(&url, Duration::from_secs(2)).await.unwrap()
}

#[tokio::test]
#[ignore = "requires a running Redis instance (REDIS_URL)"]
async fn test_scan_walks_every_cursor_batch() {
    let cache = connect().await;
    let run = Uuid::new_v4();
    // Several times the per-call COUNT so the cursor needs multiple round trips.
    for i in 0..1_200 {
        cache
            .set(&format!("run:{run}:community:{i}:member_count"), i, Some(KEY_TTL))
            .await
            .unwrap();
    }
    cache
        .set(&format!("run:{run}:community:0:posts"), 1, Some(KEY_TTL))
        .await
        .unwrap();

    let keys = cache
        .scan_match(&format!("run:{run}:community:*:member_count"))
        .await
        .unwrap();

    assert_eq!(keys.len(), 1_200);
    assert!(keys.iter().all(|key| key.ends_with(":member_count")));
}

#[tokio::test]
#[ignore = "requires a running Redis instance (REDIS_URL)"]
async fn test_add_if_present_leaves_missing_key_absent() {
    let cache = connect().await;
    let key = format!("run:{}:community:x:member_count", Uuid::new_v4());

    assert_eq!(cache.add_if_present(&key, 1).await.unwrap(), None);
    assert!(!cache.exists(&key).await.unwrap());

    cache.set(&key, 7, Some(KEY_TTL)).await.unwrap();
    assert_eq!(cache.add_if_present(&key, 1).await.unwrap(), Some(8));
    assert_eq!(cache.add_if_present(&key, -1).await.unwrap(), Some(7));
    assert!(!cache.set_if_absent(&key, 0).await.unwrap());
}
