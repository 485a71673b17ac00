//! Dependency initialization and wiring for the tally service.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tally_engine::{
    CounterCacheSlot, MemberCountSnapshot, MembershipCounter, MembershipService, PollEngine,
    Reconciler, VoteEngine,
};
use tally_repository::{
    MIGRATOR, PostgresMembershipRepository, PostgresTallyRepository, RedisCounterCache,
};
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::{ServiceError, Settings};

/// Container for all initialized dependencies.
pub struct Dependencies {
    pub pool: sqlx::PgPool,
    /// Counter cache binding shared by the membership counter and the reconciler.
    pub cache_slot: CounterCacheSlot,
    pub vote_engine: Arc<VoteEngine>,
    pub poll_engine: Arc<PollEngine>,
    pub membership_counter: Arc<MembershipCounter>,
    pub membership_service: Arc<MembershipService>,
    pub reconciler: Reconciler,
}

impl Dependencies {
    /// Connects to PostgreSQL and Redis and builds the engines.
    ///
    /// PostgreSQL is required. When Redis cannot be reached the service
    /// starts degraded with an empty cache slot; see [`reconnect_cache`].
    pub async fn new(settings: &Settings) -> Result<Self, ServiceError> {
        info!(
            redis_url = %settings.redis_url,
            run_migrations = settings.run_migrations,
            "Initializing dependencies"
        );

        let pool = PgPoolOptions::new()
            .max_connections(settings.database_max_connections)
            .connect(&settings.database_url)
            .await?;
        info!("PostgreSQL connection established");

        if settings.run_migrations {
            MIGRATOR.run(&pool).await?;
            info!("Database migrations applied");
        }

        let tally_repository = Arc::new(PostgresTallyRepository::new(pool.clone()).await?);
        let membership_repository = Arc::new(PostgresMembershipRepository::new(pool.clone()).await?);

        let cache_slot =
            match RedisCounterCache::connect(&settings.redis_url, settings.cache_connect_timeout).await {
                Ok(cache) => {
                    info!("Redis connection established");
                    CounterCacheSlot::connected(Arc::new(cache))
                }
                Err(e) => {
                    warn!(
                        redis_url = %settings.redis_url,
                        error = %e,
                        "Redis unreachable, member counts unavailable until it reconnects"
                    );
                    CounterCacheSlot::empty()
                }
            };

        let membership_counter = Arc::new(MembershipCounter::new(
            cache_slot.clone(),
            membership_repository.clone(),
        ));
        let membership_service = Arc::new(MembershipService::new(
            membership_repository.clone(),
            membership_counter.clone(),
        ));
        let reconciler = Reconciler::new(
            MemberCountSnapshot::new(cache_slot.clone()),
            membership_repository,
        )
        .with_interval(settings.reconcile_interval);

        Ok(Self {
            pool,
            cache_slot,
            vote_engine: Arc::new(VoteEngine::new(tally_repository.clone())),
            poll_engine: Arc::new(PollEngine::new(tally_repository)),
            membership_counter,
            membership_service,
            reconciler,
        })
    }
}

/// Retries the Redis connection every `retry_interval` until it succeeds or
/// `shutdown` fires, then installs it into `slot`.
///
/// Returns immediately if the slot is already connected.
pub async fn reconnect_cache(
    slot: CounterCacheSlot,
    redis_url: String,
    connect_timeout: Duration,
    retry_interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    while !slot.is_connected() {
        tokio::select! {
            _ = shutdown.recv() => return,
            result = RedisCounterCache::connect(&redis_url, connect_timeout) => {
                match result {
                    Ok(cache) => {
                        slot.install(Arc::new(cache));
                        info!("Redis connection established, member counts available");
                        return;
                    }
                    Err(e) => warn!(
                        redis_url = %redis_url,
                        error = %e,
                        retry_interval_secs = retry_interval.as_secs(),
                        "Failed to connect to Redis, retrying..."
                    ),
                }
            }
        }

        tokio::select! {
            _ = shutdown.recv() => return,
            _ = sleep(retry_interval) => {}
        }
    }
}
