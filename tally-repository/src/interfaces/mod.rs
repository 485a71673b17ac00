//! Adapter traits the engines are written against.
mod counter_cache;
mod membership;
mod tally;

pub use counter_cache::CounterCache;
pub use membership::{MemberCountMirror, MembershipRepository};
pub use tally::{TallyRepository, TallyTransaction};
