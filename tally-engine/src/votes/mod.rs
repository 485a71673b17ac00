//! Post and comment voting.
//!
//! Casting, flipping and retracting a vote are one toggle operation: the
//! transition is decided by the user's existing vote, and the vote record and
//! the target's counters change in the same transaction.
use std::sync::Arc;

use chrono::Utc;
use tally_repository::TallyRepository;
use tally_shared::types::{AggregateScore, ScoreDelta, TargetId, UserId, Vote};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::EngineError;
use crate::validation::ensure_id;

/// What a vote request does to the user's vote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTransition {
    /// No prior vote; a record is created.
    Cast,
    /// Same value as the prior vote; the record is deleted.
    Retract,
    /// Opposite value; the record is updated in place.
    Flip,
}

/// Decides the transition and counter delta for a vote request.
///
/// `previous` is the value of the user's existing vote on the target, if any.
pub fn resolve_vote(previous: Option<bool>, value: bool) -> (VoteTransition, ScoreDelta) {
    let (transition, up, down) = match (previous, value) {
        (None, true)         => (VoteTransition::Cast, 1, 0),
        (None, false)        => (VoteTransition::Cast, 0, 1),
        (Some(true), true)   => (VoteTransition::Retract, -1, 0),
        (Some(false), false) => (VoteTransition::Retract, 0, -1),
        (Some(true), false)  => (VoteTransition::Flip, -1, 1),
        (Some(false), true)  => (VoteTransition::Flip, 1, -1),
    };
    (transition, ScoreDelta { up, down })
}

/// Applies vote toggles to targets.
pub struct VoteEngine {
    repository: Arc<dyn TallyRepository>,
}

impl VoteEngine {
    pub fn new(repository: Arc<dyn TallyRepository>) -> Self {
        Self { repository }
    }

    /// Casts, flips or retracts `user_id`'s vote on `target_id` and returns
    /// the target's score after the change.
    #[instrument(skip(self))]
    pub async fn cast_vote(
        &self,
        user_id: UserId,
        target_id: TargetId,
        value: bool,
    ) -> Result<AggregateScore, EngineError> {
        ensure_id(user_id, "user_id")?;
        ensure_id(target_id, "target_id")?;

        let mut tx = self.repository.begin().await?;
        let target = tx
            .lock_target(target_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("target {target_id}")))?;

        let existing = tx.find_vote(user_id, target_id).await?;
        let (transition, delta) = resolve_vote(existing.as_ref().map(|vote| vote.value), value);

        match existing {
            None => {
                let vote = Vote {
                    id: Uuid::new_v4(),
                    user_id,
                    target_id,
                    target_type: target.target_type,
                    value,
                    created_at: Utc::now(),
                };
                tx.insert_vote(&vote).await?;
            }
            Some(vote) if transition == VoteTransition::Retract => tx.delete_vote(vote.id).await?,
            Some(vote) => tx.update_vote_value(vote.id, value).await?,
        }

        let score = tx
            .apply_score_delta(target_id, delta)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("target {target_id}")))?;
        tx.commit().await?;

        debug!(?transition, up = score.up, down = score.down, "Vote applied");
        Ok(score)
    }

    /// Removes `user_id`'s vote on `target_id`, failing with `NotFound` if
    /// there is none.
    #[instrument(skip(self))]
    pub async fn retract_vote(
        &self,
        user_id: UserId,
        target_id: TargetId,
    ) -> Result<AggregateScore, EngineError> {
        ensure_id(user_id, "user_id")?;
        ensure_id(target_id, "target_id")?;

        let mut tx = self.repository.begin().await?;
        tx.lock_target(target_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("target {target_id}")))?;

        let vote = tx
            .find_vote(user_id, target_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("vote on target {target_id}")))?;
        let (_, delta) = resolve_vote(Some(vote.value), vote.value);

        tx.delete_vote(vote.id).await?;
        let score = tx
            .apply_score_delta(target_id, delta)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("target {target_id}")))?;
        tx.commit().await?;

        debug!(up = score.up, down = score.down, "Vote retracted");
        Ok(score)
    }

    /// The user's current vote on the target, if any.
    pub async fn user_vote(
        &self,
        user_id: UserId,
        target_id: TargetId,
    ) -> Result<Option<Vote>, EngineError> {
        ensure_id(user_id, "user_id")?;
        ensure_id(target_id, "target_id")?;

        let mut tx = self.repository.begin().await?;
        Ok(tx.find_vote(user_id, target_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_repository::MemoryTallyRepository;
    use tally_shared::types::{Target, TargetType};
    use uuid::uuid;

    const USER: Uuid = uuid!("a7ef0016-a2f4-44fb-82ca-a4f5c61d2cf5");

    async fn engine_with_target() -> (VoteEngine, MemoryTallyRepository, TargetId) {
        let repository = MemoryTallyRepository::new();
        let target = Target {
            id: Uuid::new_v4(),
            target_type: TargetType::Comment,
            author_id: Uuid::new_v4(),
            community_id: None,
            score: AggregateScore::default(),
            poll: None,
        };
        let target_id = target.id;
        repository.insert_target(target).await;
        (VoteEngine::new(Arc::new(repository.clone())), repository, target_id)
    }

    #[test]
    fn test_resolve_vote_table() {
        let cases = [
            (None, true, VoteTransition::Cast, 1, 0),
            (None, false, VoteTransition::Cast, 0, 1),
            (Some(true), true, VoteTransition::Retract, -1, 0),
            (Some(false), false, VoteTransition::Retract, 0, -1),
            (Some(true), false, VoteTransition::Flip, -1, 1),
            (Some(false), true, VoteTransition::Flip, 1, -1),
        ];
        for (previous, value, transition, up, down) in cases {
            assert_eq!(
                resolve_vote(previous, value),
                (transition, ScoreDelta { up, down }),
                "previous={previous:?} value={value}"
            );
        }
    }

    #[tokio::test]
    async fn test_same_value_twice_is_a_retraction() {
        let (engine, repository, target_id) = engine_with_target().await;

        let score = engine.cast_vote(USER, target_id, true).await.unwrap();
        assert_eq!(score, AggregateScore::new(1, 0));

        let score = engine.cast_vote(USER, target_id, true).await.unwrap();
        assert_eq!(score, AggregateScore::new(0, 0));
        assert!(repository.votes_on(target_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_opposite_value_flips_in_place() {
        let (engine, repository, target_id) = engine_with_target().await;

        engine.cast_vote(USER, target_id, true).await.unwrap();
        let score = engine.cast_vote(USER, target_id, false).await.unwrap();

        assert_eq!(score, AggregateScore::new(0, 1));
        let votes = repository.votes_on(target_id).await;
        assert_eq!(votes.len(), 1);
        assert!(!votes[0].value);
        assert_eq!(votes[0].target_type, TargetType::Comment);
    }

    #[tokio::test]
    async fn test_retract_without_vote_is_not_found() {
        let (engine, _, target_id) = engine_with_target().await;
        let result = engine.retract_vote(USER, target_id).await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_retract_removes_vote() {
        let (engine, _, target_id) = engine_with_target().await;
        engine.cast_vote(USER, target_id, false).await.unwrap();

        let score = engine.retract_vote(USER, target_id).await.unwrap();

        assert_eq!(score, AggregateScore::new(0, 0));
        assert!(engine.user_vote(USER, target_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_target_is_not_found() {
        let (engine, _, _) = engine_with_target().await;
        let result = engine.cast_vote(USER, Uuid::new_v4(), true).await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_nil_ids_are_invalid() {
        let (engine, _, target_id) = engine_with_target().await;
        assert!(matches!(
            engine.cast_vote(Uuid::nil(), target_id, true).await,
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.retract_vote(USER, Uuid::nil()).await,
            Err(EngineError::InvalidInput(_))
        ));
    }
}
