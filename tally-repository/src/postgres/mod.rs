//! PostgreSQL implementations of the durable store adapters.
//!
//! ## Database Tables
//!
//! - `targets`: posts and comments with their `upvotes`/`downvotes` aggregate
//! - `votes`: one row per `(user_id, target_id)`
//! - `polls`, `poll_options`: poll metadata and per-option tallies
//! - `poll_votes`: one row per `(post_id, user_id, option_id)`
//! - `communities`, `memberships`: membership records and the `member_count` mirror
mod membership_repository;
mod tally_repository;

pub use membership_repository::PostgresMembershipRepository;
pub use tally_repository::{PostgresTallyRepository, PostgresTallyTransaction};

/// Embedded schema migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("src/postgres/migrations");
