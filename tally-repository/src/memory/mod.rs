//! In-memory adapters.
//!
//! They honour the same contracts as the PostgreSQL and Redis adapters
//! (transactions, unique constraints, atomic counters) and add failure
//! injection so rollback and degradation paths can be exercised without
//! external services.
mod counter_cache;
mod membership;
mod tally;

pub use counter_cache::MemoryCounterCache;
pub use membership::MemoryMembershipRepository;
pub use tally::{FailPoint, MemoryTallyRepository};
