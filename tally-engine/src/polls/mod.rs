//! Poll voting and poll editing.
//!
//! Option tallies and the poll total only ever move together with the poll
//! vote records they count, and structural edits are refused once the first
//! vote exists.
mod engine;

pub use engine::PollEngine;
