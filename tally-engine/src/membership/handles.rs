use tally_repository::RepositoryError;
use tally_shared::types::{CommunityId, MEMBER_COUNT_KEY_PATTERN, member_count_key};

use crate::EngineError;
use crate::membership::CounterCacheSlot;

/// Connection-level cache failures surface as `CounterUnavailable`.
fn cache_error(err: RepositoryError) -> EngineError {
    match err {
        RepositoryError::Unavailable(_) => EngineError::CounterUnavailable,
        RepositoryError::Cache(ref e)
            if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout() =>
        {
            EngineError::CounterUnavailable
        }
        other => EngineError::Repository(other),
    }
}

/// Write handle over the live member counters.
#[derive(Clone)]
pub(crate) struct MemberCountCache {
    slot: CounterCacheSlot,
}

impl MemberCountCache {
    pub(crate) fn new(slot: CounterCacheSlot) -> Self {
        Self { slot }
    }

    pub(crate) async fn get(&self, community_id: CommunityId) -> Result<Option<i64>, EngineError> {
        let cache = self.slot.current()?;
        cache.get(&member_count_key(&community_id)).await.map_err(cache_error)
    }

    pub(crate) async fn exists(&self, community_id: CommunityId) -> Result<bool, EngineError> {
        let cache = self.slot.current()?;
        cache.exists(&member_count_key(&community_id)).await.map_err(cache_error)
    }

    /// Stores `count` only if no counter exists yet.
    pub(crate) async fn seed(&self, community_id: CommunityId, count: i64) -> Result<bool, EngineError> {
        let cache = self.slot.current()?;
        cache
            .set_if_absent(&member_count_key(&community_id), count)
            .await
            .map_err(cache_error)
    }

    /// Adds `delta` to an existing counter. `None` means the counter is gone
    /// and has to be seeded again.
    pub(crate) async fn add(&self, community_id: CommunityId, delta: i64) -> Result<Option<i64>, EngineError> {
        let cache = self.slot.current()?;
        cache
            .add_if_present(&member_count_key(&community_id), delta)
            .await
            .map_err(cache_error)
    }
}

/// Read-only view of the live member counters, for reconciliation.
#[derive(Clone)]
pub struct MemberCountSnapshot {
    slot: CounterCacheSlot,
}

impl MemberCountSnapshot {
    pub fn new(slot: CounterCacheSlot) -> Self {
        Self { slot }
    }

    /// Every member counter key currently in the cache.
    pub async fn keys(&self) -> Result<Vec<String>, EngineError> {
        let cache = self.slot.current()?;
        cache
            .scan_match(MEMBER_COUNT_KEY_PATTERN)
            .await
            .map_err(cache_error)
    }

    pub async fn read(&self, key: &str) -> Result<Option<i64>, EngineError> {
        let cache = self.slot.current()?;
        cache.get(key).await.map_err(cache_error)
    }
}
