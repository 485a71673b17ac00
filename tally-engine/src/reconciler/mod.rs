//! Background reconciliation of the durable member count mirror.
//!
//! Each cycle copies every live counter from the cache into
//! `communities.member_count`. The direction is one-way: the cache wins.

use std::sync::Arc;

use tally_repository::MemberCountMirror;
use tally_shared::types::parse_member_count_key;
use tokio::sync::broadcast;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, error, info, instrument, warn};

use crate::EngineError;
use crate::membership::MemberCountSnapshot;

/// Default time between reconciliation cycles.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome of one reconciliation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Keys returned by the scan.
    pub scanned: usize,
    /// Counters written to the durable mirror.
    pub applied: usize,
    /// Keys that could not be reconciled this cycle.
    pub skipped: usize,
}

pub struct Reconciler {
    snapshot: MemberCountSnapshot,
    mirror: Arc<dyn MemberCountMirror>,
    interval: Duration,
}

impl Reconciler {
    pub fn new(snapshot: MemberCountSnapshot, mirror: Arc<dyn MemberCountMirror>) -> Self {
        Self {
            snapshot,
            mirror,
            interval: DEFAULT_RECONCILE_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs a single cycle.
    ///
    /// A failing key is logged and skipped; only a failure to enumerate the
    /// keys fails the cycle.
    #[instrument(skip(self))]
    pub async fn reconcile_once(&self) -> Result<ReconcileReport, EngineError> {
        let keys = self.snapshot.keys().await?;
        let mut report = ReconcileReport {
            scanned: keys.len(),
            ..Default::default()
        };

        for key in &keys {
            let Some(community_id) = parse_member_count_key(key) else {
                warn!(key = %key, "Skipping unparsable member count key");
                report.skipped += 1;
                continue;
            };

            let count = match self.snapshot.read(key).await {
                Ok(Some(count)) => count,
                Ok(None) => {
                    debug!(key = %key, "Member count key vanished before read");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to read member count");
                    report.skipped += 1;
                    continue;
                }
            };

            match self.mirror.write_member_count(community_id, count).await {
                Ok(true) => report.applied += 1,
                Ok(false) => {
                    warn!(%community_id, count, "Community missing from durable store");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(%community_id, error = %e, "Failed to write member count");
                    report.skipped += 1;
                }
            }
        }

        Ok(report)
    }

    /// Runs a cycle every interval until `shutdown` fires.
    #[instrument(skip_all)]
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting member count reconciler"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    match self.reconcile_once().await {
                        Ok(report) => info!(
                            scanned = report.scanned,
                            applied = report.applied,
                            skipped = report.skipped,
                            "Reconciliation cycle complete"
                        ),
                        Err(EngineError::CounterUnavailable) => {
                            warn!("Counter cache unavailable, skipping reconciliation cycle");
                        }
                        Err(e) => error!(error = %e, "Reconciliation cycle failed"),
                    }
                }
            }
        }

        info!("Member count reconciler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::CounterCacheSlot;
    use tally_repository::{CounterCache, MemoryCounterCache, MemoryMembershipRepository};
    use tally_shared::types::{Community, member_count_key};
    use uuid::Uuid;

    fn community(memberships: &MemoryMembershipRepository) -> Uuid {
        let id = Uuid::new_v4();
        memberships.insert_community(Community {
            id,
            name: "rustaceans".to_string(),
            member_count: 0,
        });
        id
    }

    fn reconciler(cache: &MemoryCounterCache, memberships: &MemoryMembershipRepository) -> Reconciler {
        let slot = CounterCacheSlot::connected(Arc::new(cache.clone()));
        Reconciler::new(MemberCountSnapshot::new(slot), Arc::new(memberships.clone()))
    }

    #[tokio::test]
    async fn test_cache_value_is_written_to_mirror() {
        let cache = MemoryCounterCache::new();
        let memberships = MemoryMembershipRepository::new();
        let community_id = community(&memberships);
        cache.set(&member_count_key(&community_id), 5, None).await.unwrap();

        let report = reconciler(&cache, &memberships).reconcile_once().await.unwrap();

        assert_eq!(report, ReconcileReport { scanned: 1, applied: 1, skipped: 0 });
        assert_eq!(memberships.community(community_id).unwrap().member_count, 5);
    }

    #[tokio::test]
    async fn test_bad_keys_are_skipped() {
        let cache = MemoryCounterCache::new();
        let memberships = MemoryMembershipRepository::new();
        let community_id = community(&memberships);
        cache.set(&member_count_key(&community_id), 3, None).await.unwrap();
        cache.set("community:not-a-uuid:member_count", 9, None).await.unwrap();
        cache.set(&member_count_key(&Uuid::new_v4()), 4, None).await.unwrap();
        cache.set("community:other:posts", 1, None).await.unwrap();

        let report = reconciler(&cache, &memberships).reconcile_once().await.unwrap();

        assert_eq!(report, ReconcileReport { scanned: 3, applied: 1, skipped: 2 });
        assert_eq!(memberships.community(community_id).unwrap().member_count, 3);
    }

    #[tokio::test]
    async fn test_scan_failure_fails_cycle() {
        let cache = MemoryCounterCache::new();
        let memberships = MemoryMembershipRepository::new();
        cache.set_available(false);
        let result = reconciler(&cache, &memberships).reconcile_once().await;
        assert!(matches!(result, Err(EngineError::CounterUnavailable)));
    }

    #[tokio::test]
    async fn test_scan_dropped_partway_fails_cycle_without_writes() {
        let cache = MemoryCounterCache::new();
        let memberships = MemoryMembershipRepository::new();
        let communities: Vec<Uuid> = (0..25).map(|_| community(&memberships)).collect();
        for id in &communities {
            cache.set(&member_count_key(id), 4, None).await.unwrap();
        }
        cache.fail_scan_after(1);

        let result = reconciler(&cache, &memberships).reconcile_once().await;

        assert!(matches!(result, Err(EngineError::CounterUnavailable)));
        for id in &communities {
            assert_eq!(memberships.community(*id).unwrap().member_count, 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reconciles_until_shutdown() {
        let cache = MemoryCounterCache::new();
        let memberships = MemoryMembershipRepository::new();
        let community_id = community(&memberships);
        cache.set(&member_count_key(&community_id), 5, None).await.unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let worker = reconciler(&cache, &memberships).with_interval(Duration::from_secs(1));
        let handle = tokio::spawn(worker.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(memberships.community(community_id).unwrap().member_count, 5);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
