//! This module defines the transactional interface over vote records, poll
//! records and the aggregate fields stored on targets.
//!
//! Every mutation of an aggregate happens inside a `TallyTransaction`, so the
//! event records and the counters derived from them commit or roll back
//! together.
use async_trait::async_trait;
use tally_shared::types::{
    AggregateScore, OptionId, Poll, PollMetaUpdate, PollOption, PollVote, PostId, ScoreDelta,
    Target, TargetId, UserId, Vote, VoteId,
};

use crate::errors::RepositoryError;

/// Entry point to the durable store.
#[async_trait]
pub trait TallyRepository: Send + Sync {
    /// Opens a new unit of work.
    ///
    /// # Returns
    ///
    /// A boxed transaction, or a `RepositoryError` if no connection could be
    /// acquired.
    async fn begin(&self) -> Result<Box<dyn TallyTransaction>, RepositoryError>;
}

/// An open unit of work.
///
/// Nothing is visible to other transactions until [`TallyTransaction::commit`]
/// returns. Dropping the transaction without committing rolls it back, which
/// is also what happens when the owning future is cancelled.
///
/// Counter updates are relative (`+ delta`), never a read-modify-write of a
/// previously loaded value.
#[async_trait]
pub trait TallyTransaction: Send {
    /// Loads the target and takes its row lock for the rest of the transaction.
    ///
    /// Concurrent transactions locking the same target are serialized here.
    /// The poll of a poll post is loaded and locked along with it.
    ///
    /// # Arguments
    ///
    /// * `target_id` - Post or comment to lock
    ///
    /// # Returns
    ///
    /// The target with its current aggregate, or `None` if it does not exist.
    async fn lock_target(&mut self, target_id: TargetId) -> Result<Option<Target>, RepositoryError>;

    async fn find_vote(
        &mut self,
        user_id: UserId,
        target_id: TargetId,
    ) -> Result<Option<Vote>, RepositoryError>;

    /// Fails with [`RepositoryError::Conflict`] if the user already voted on
    /// the target.
    async fn insert_vote(&mut self, vote: &Vote) -> Result<(), RepositoryError>;

    async fn update_vote_value(&mut self, vote_id: VoteId, value: bool) -> Result<(), RepositoryError>;

    async fn delete_vote(&mut self, vote_id: VoteId) -> Result<(), RepositoryError>;

    /// Adds `delta` to the target's counters.
    ///
    /// # Arguments
    ///
    /// * `target_id` - Target whose `up`/`down` counters move
    /// * `delta` - Relative change, applied as `counter = counter + delta`
    ///
    /// # Returns
    ///
    /// The score after the update as seen by this transaction, or `None` if
    /// the target does not exist.
    async fn apply_score_delta(
        &mut self,
        target_id: TargetId,
        delta: ScoreDelta,
    ) -> Result<Option<AggregateScore>, RepositoryError>;

    /// All poll votes `user_id` holds on `post_id`.
    async fn find_poll_votes(
        &mut self,
        post_id: PostId,
        user_id: UserId,
    ) -> Result<Vec<PollVote>, RepositoryError>;

    async fn insert_poll_vote(&mut self, vote: &PollVote) -> Result<(), RepositoryError>;

    /// Deletes every poll vote of `user_id` on `post_id` and returns how many
    /// were removed.
    async fn delete_poll_votes(&mut self, post_id: PostId, user_id: UserId) -> Result<u64, RepositoryError>;

    /// Adds `delta` to one option's tally and to the poll total in the same
    /// statement.
    ///
    /// # Arguments
    ///
    /// * `post_id` - Post carrying the poll
    /// * `option_id` - Option whose tally moves
    /// * `delta` - Relative change for both the option and the total
    ///
    /// # Returns
    ///
    /// `false`, with nothing changed, if the option does not belong to the poll.
    async fn apply_option_delta(
        &mut self,
        post_id: PostId,
        option_id: OptionId,
        delta: i64,
    ) -> Result<bool, RepositoryError>;

    async fn update_poll_meta(
        &mut self,
        post_id: PostId,
        update: &PollMetaUpdate,
    ) -> Result<(), RepositoryError>;

    /// Appends options after the existing ones.
    async fn insert_poll_options(
        &mut self,
        post_id: PostId,
        options: &[PollOption],
    ) -> Result<(), RepositoryError>;

    async fn delete_poll_options(
        &mut self,
        post_id: PostId,
        option_ids: &[OptionId],
    ) -> Result<u64, RepositoryError>;

    async fn rename_poll_option(
        &mut self,
        post_id: PostId,
        option_id: OptionId,
        text: &str,
    ) -> Result<bool, RepositoryError>;

    /// Reads the poll as seen by this transaction, options in display order.
    async fn load_poll(&mut self, post_id: PostId) -> Result<Option<Poll>, RepositoryError>;

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}
