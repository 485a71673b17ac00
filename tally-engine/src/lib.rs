//! # Tally Engine
//! Consistency-preserving mutations of derived aggregates: post and comment
//! scores, poll tallies and community member counts.
//!
//! Every engine returns the aggregate as it stands after its own write, read
//! inside the same unit of work.
pub mod errors;
pub mod membership;
pub mod polls;
pub mod reconciler;
pub mod votes;

mod validation;

pub use errors::EngineError;
pub use membership::{CounterCacheSlot, MemberCountSnapshot, MembershipCounter, MembershipService};
pub use polls::PollEngine;
pub use reconciler::{DEFAULT_RECONCILE_INTERVAL, ReconcileReport, Reconciler};
pub use votes::{VoteEngine, VoteTransition, resolve_vote};
