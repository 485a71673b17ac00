use std::sync::Arc;

use tally_repository::MembershipRepository;
use tally_shared::types::CommunityId;
use tracing::{debug, info, instrument, warn};

use crate::EngineError;
use crate::membership::{CounterCacheSlot, MemberCountCache};
use crate::validation::ensure_id;

/// Re-seeds tried before giving up on a counter that keeps disappearing.
const SEED_ATTEMPTS: usize = 3;

/// Whether the durable memberships already reflect the change being counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DurableWrite {
    Pending,
    Applied,
}

/// Cache-aside member counter.
///
/// The first access to a community counts its durable memberships and seeds
/// the cache with `SET NX`, so a seed racing with increments never overwrites
/// them. Updates only touch an existing counter; a counter lost to eviction
/// is seeded again from the memberships instead of restarting at zero. The
/// durable `member_count` column is never read.
pub struct MembershipCounter {
    cache: MemberCountCache,
    memberships: Arc<dyn MembershipRepository>,
}

impl MembershipCounter {
    pub fn new(slot: CounterCacheSlot, memberships: Arc<dyn MembershipRepository>) -> Self {
        Self {
            cache: MemberCountCache::new(slot),
            memberships,
        }
    }

    /// Makes sure the community has a live counter.
    ///
    /// Fails with `CounterUnavailable` while the cache is unreachable.
    pub(crate) async fn ensure_seeded(&self, community_id: CommunityId) -> Result<(), EngineError> {
        if self.cache.exists(community_id).await? {
            return Ok(());
        }
        let count = self.memberships.count_members(community_id).await?;
        if self.cache.seed(community_id, count).await? {
            info!(%community_id, count, "Seeded member counter");
        }
        Ok(())
    }

    /// Moves the counter by `delta`, seeding it from the memberships when it
    /// is missing.
    pub(crate) async fn apply(
        &self,
        community_id: CommunityId,
        delta: i64,
        durable: DurableWrite,
    ) -> Result<i64, EngineError> {
        for _ in 0..SEED_ATTEMPTS {
            if let Some(count) = self.cache.add(community_id, delta).await? {
                return Ok(count);
            }

            let members = self.memberships.count_members(community_id).await?;
            let count = match durable {
                DurableWrite::Pending => members + delta,
                DurableWrite::Applied => members,
            };
            if self.cache.seed(community_id, count).await? {
                match durable {
                    DurableWrite::Pending => info!(%community_id, count, "Seeded member counter"),
                    DurableWrite::Applied => {
                        warn!(%community_id, count, "Member counter was lost, reseeded from memberships")
                    }
                }
                return Ok(count);
            }
        }

        warn!(%community_id, attempts = SEED_ATTEMPTS, "Member counter kept disappearing while seeding");
        Err(EngineError::CounterUnavailable)
    }

    #[instrument(skip(self))]
    pub async fn get_member_count(&self, community_id: CommunityId) -> Result<i64, EngineError> {
        ensure_id(community_id, "community_id")?;

        if let Some(count) = self.cache.get(community_id).await? {
            return Ok(count);
        }
        let count = self.memberships.count_members(community_id).await?;
        if self.cache.seed(community_id, count).await? {
            info!(%community_id, count, "Seeded member counter");
            return Ok(count);
        }
        Ok(self.cache.get(community_id).await?.unwrap_or(count))
    }

    /// Counts one new member whose durable membership is not part of the
    /// stored memberships yet.
    #[instrument(skip(self))]
    pub async fn increment(&self, community_id: CommunityId) -> Result<i64, EngineError> {
        ensure_id(community_id, "community_id")?;
        let count = self.apply(community_id, 1, DurableWrite::Pending).await?;
        debug!(count, "Member counter incremented");
        Ok(count)
    }

    /// Counts one departed member whose durable membership is still stored.
    #[instrument(skip(self))]
    pub async fn decrement(&self, community_id: CommunityId) -> Result<i64, EngineError> {
        ensure_id(community_id, "community_id")?;
        let count = self.apply(community_id, -1, DurableWrite::Pending).await?;
        debug!(count, "Member counter decremented");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_repository::{CounterCache, MemoryCounterCache, MemoryMembershipRepository};
    use tally_shared::types::{Community, member_count_key};
    use uuid::Uuid;

    fn setup(members: usize) -> (MembershipCounter, MemoryCounterCache, CommunityId) {
        let memberships = MemoryMembershipRepository::new();
        let community_id = Uuid::new_v4();
        memberships.insert_community(Community {
            id: community_id,
            name: "rustaceans".to_string(),
            member_count: 0,
        });
        memberships.seed_members(community_id, members);
        let cache = MemoryCounterCache::new();
        let counter = MembershipCounter::new(
            CounterCacheSlot::connected(Arc::new(cache.clone())),
            Arc::new(memberships),
        );
        (counter, cache, community_id)
    }

    #[tokio::test]
    async fn test_first_increment_seeds_from_durable_count() {
        let (counter, _, community_id) = setup(7);
        assert_eq!(counter.increment(community_id).await.unwrap(), 8);
        assert_eq!(counter.get_member_count(community_id).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_first_decrement_seeds_from_durable_count() {
        let (counter, _, community_id) = setup(3);
        assert_eq!(counter.decrement(community_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_existing_counter_is_authoritative() {
        let (counter, cache, community_id) = setup(7);
        cache
            .set(&member_count_key(&community_id), 42, None)
            .await
            .unwrap();
        assert_eq!(counter.get_member_count(community_id).await.unwrap(), 42);
        assert_eq!(counter.increment(community_id).await.unwrap(), 43);
    }

    #[tokio::test]
    async fn test_get_seeds_without_expiry() {
        let (counter, cache, community_id) = setup(4);
        assert_eq!(counter.get_member_count(community_id).await.unwrap(), 4);
        assert_eq!(
            cache.get(&member_count_key(&community_id)).await.unwrap(),
            Some(4)
        );
    }

    #[tokio::test]
    async fn test_empty_slot_is_unavailable() {
        let counter = MembershipCounter::new(
            CounterCacheSlot::empty(),
            Arc::new(MemoryMembershipRepository::new()),
        );
        let community_id = Uuid::new_v4();
        assert!(matches!(
            counter.get_member_count(community_id).await,
            Err(EngineError::CounterUnavailable)
        ));
        assert!(matches!(
            counter.increment(community_id).await,
            Err(EngineError::CounterUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_cache_is_unavailable() {
        let (counter, cache, community_id) = setup(1);
        cache.set_available(false);
        assert!(matches!(
            counter.decrement(community_id).await,
            Err(EngineError::CounterUnavailable)
        ));
    }
}
