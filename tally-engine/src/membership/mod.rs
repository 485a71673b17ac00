//! Community member counts.
//!
//! The live count sits in the counter cache under
//! `community:<id>:member_count`. It is seeded from the durable memberships
//! on first use and afterwards only moves through atomic increments and
//! decrements. Writes go through [`MemberCountCache`], which only this module
//! can construct; the reconciler reads through [`MemberCountSnapshot`].
mod counter;
mod handles;
mod service;
mod slot;

pub use counter::MembershipCounter;
pub(crate) use counter::DurableWrite;
pub(crate) use handles::MemberCountCache;
pub use handles::MemberCountSnapshot;
pub use service::MembershipService;
pub use slot::CounterCacheSlot;
