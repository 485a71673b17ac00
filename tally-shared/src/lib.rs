//! # Tally Shared
//! This crate defines the data structures shared across the tally workspace:
//! vote targets and their aggregate scores, votes, polls and poll votes,
//! community memberships, and the cache key layout for member counters.
pub mod types;
