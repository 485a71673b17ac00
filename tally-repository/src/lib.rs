//! # Tally Repository
//! Storage adapters for the tally engines: the transactional durable store
//! for votes and polls, membership persistence, and the counter cache.
//! PostgreSQL and Redis back production; the in-memory adapters back tests.
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod postgres;
pub mod redis;

pub use errors::RepositoryError;
pub use interfaces::{
    CounterCache, MemberCountMirror, MembershipRepository, TallyRepository, TallyTransaction,
};
pub use memory::{
    FailPoint, MemoryCounterCache, MemoryMembershipRepository, MemoryTallyRepository,
};
pub use postgres::{PostgresMembershipRepository, PostgresTallyRepository, MIGRATOR};
pub use self::redis::RedisCounterCache;
