use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tally_shared::types::{
    AggregateScore, OptionId, Poll, PollMetaUpdate, PollOption, PollVote, PollVoteId, PostId,
    ScoreDelta, Target, TargetId, UserId, Vote, VoteId,
};
use tokio::sync::OwnedMutexGuard;

use crate::{RepositoryError, TallyRepository, TallyTransaction};

/// Operations that can be told to fail on their next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    InsertVote,
    ApplyScoreDelta,
    InsertPollVote,
    ApplyOptionDelta,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct TallyState {
    targets: HashMap<TargetId, Target>,
    votes: HashMap<VoteId, Vote>,
    poll_votes: HashMap<PollVoteId, PollVote>,
}

/// In-memory [`TallyRepository`].
///
/// Transactions are fully serialized: `begin` takes the store lock and works
/// on a private copy that replaces the shared state on commit.
#[derive(Clone, Default)]
pub struct MemoryTallyRepository {
    state: Arc<tokio::sync::Mutex<TallyState>>,
    fail_points: Arc<Mutex<HashSet<FailPoint>>>,
}

impl MemoryTallyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call of `point` return [`RepositoryError::Unavailable`].
    pub fn fail_once(&self, point: FailPoint) {
        if let Ok(mut points) = self.fail_points.lock() {
            points.insert(point);
        }
    }

    pub async fn insert_target(&self, target: Target) {
        self.state.lock().await.targets.insert(target.id, target);
    }

    pub async fn target(&self, target_id: TargetId) -> Option<Target> {
        self.state.lock().await.targets.get(&target_id).cloned()
    }

    pub async fn votes_on(&self, target_id: TargetId) -> Vec<Vote> {
        self.state
            .lock()
            .await
            .votes
            .values()
            .filter(|vote| vote.target_id == target_id)
            .cloned()
            .collect()
    }

    pub async fn poll_votes_on(&self, post_id: PostId) -> Vec<PollVote> {
        self.state
            .lock()
            .await
            .poll_votes
            .values()
            .filter(|vote| vote.post_id == post_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TallyRepository for MemoryTallyRepository {
    async fn begin(&self) -> Result<Box<dyn TallyTransaction>, RepositoryError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTallyTransaction {
            guard,
            working,
            fail_points: self.fail_points.clone(),
        }))
    }
}

struct MemoryTallyTransaction {
    guard: OwnedMutexGuard<TallyState>,
    working: TallyState,
    fail_points: Arc<Mutex<HashSet<FailPoint>>>,
}

impl MemoryTallyTransaction {
    fn check(&self, point: FailPoint) -> Result<(), RepositoryError> {
        let triggered = self
            .fail_points
            .lock()
            .map(|mut points| points.remove(&point))
            .unwrap_or(false);
        if triggered {
            return Err(RepositoryError::unavailable(format!("injected failure at {point:?}")));
        }
        Ok(())
    }

    fn poll_mut(&mut self, post_id: PostId) -> Option<&mut Poll> {
        self.working
            .targets
            .get_mut(&post_id)
            .and_then(|target| target.poll.as_mut())
    }
}

#[async_trait]
impl TallyTransaction for MemoryTallyTransaction {
    async fn lock_target(&mut self, target_id: TargetId) -> Result<Option<Target>, RepositoryError> {
        Ok(self.working.targets.get(&target_id).cloned())
    }

    async fn find_vote(
        &mut self,
        user_id: UserId,
        target_id: TargetId,
    ) -> Result<Option<Vote>, RepositoryError> {
        Ok(self
            .working
            .votes
            .values()
            .find(|vote| vote.user_id == user_id && vote.target_id == target_id)
            .cloned())
    }

    async fn insert_vote(&mut self, vote: &Vote) -> Result<(), RepositoryError> {
        self.check(FailPoint::InsertVote)?;
        if !self.working.targets.contains_key(&vote.target_id) {
            return Err(RepositoryError::MissingReference("vote".to_string()));
        }
        let duplicate = self
            .working
            .votes
            .values()
            .any(|existing| existing.user_id == vote.user_id && existing.target_id == vote.target_id);
        if duplicate || self.working.votes.contains_key(&vote.id) {
            return Err(RepositoryError::Conflict("vote".to_string()));
        }
        self.working.votes.insert(vote.id, vote.clone());
        Ok(())
    }

    async fn update_vote_value(&mut self, vote_id: VoteId, value: bool) -> Result<(), RepositoryError> {
        if let Some(vote) = self.working.votes.get_mut(&vote_id) {
            vote.value = value;
        }
        Ok(())
    }

    async fn delete_vote(&mut self, vote_id: VoteId) -> Result<(), RepositoryError> {
        self.working.votes.remove(&vote_id);
        Ok(())
    }

    async fn apply_score_delta(
        &mut self,
        target_id: TargetId,
        delta: ScoreDelta,
    ) -> Result<Option<AggregateScore>, RepositoryError> {
        self.check(FailPoint::ApplyScoreDelta)?;
        Ok(self.working.targets.get_mut(&target_id).map(|target| {
            target.score = target.score + delta;
            target.score
        }))
    }

    async fn find_poll_votes(
        &mut self,
        post_id: PostId,
        user_id: UserId,
    ) -> Result<Vec<PollVote>, RepositoryError> {
        let mut votes: Vec<PollVote> = self
            .working
            .poll_votes
            .values()
            .filter(|vote| vote.post_id == post_id && vote.user_id == user_id)
            .cloned()
            .collect();
        votes.sort_by_key(|vote| vote.created_at);
        Ok(votes)
    }

    async fn insert_poll_vote(&mut self, vote: &PollVote) -> Result<(), RepositoryError> {
        self.check(FailPoint::InsertPollVote)?;
        let option_exists = self
            .working
            .targets
            .get(&vote.post_id)
            .and_then(|target| target.poll.as_ref())
            .is_some_and(|poll| poll.option(&vote.option_id).is_some());
        if !option_exists {
            return Err(RepositoryError::MissingReference("poll vote".to_string()));
        }
        let duplicate = self.working.poll_votes.values().any(|existing| {
            existing.post_id == vote.post_id
                && existing.user_id == vote.user_id
                && existing.option_id == vote.option_id
        });
        if duplicate {
            return Err(RepositoryError::Conflict("poll vote".to_string()));
        }
        self.working.poll_votes.insert(vote.id, vote.clone());
        Ok(())
    }

    async fn delete_poll_votes(&mut self, post_id: PostId, user_id: UserId) -> Result<u64, RepositoryError> {
        let before = self.working.poll_votes.len();
        self.working
            .poll_votes
            .retain(|_, vote| !(vote.post_id == post_id && vote.user_id == user_id));
        Ok((before - self.working.poll_votes.len()) as u64)
    }

    async fn apply_option_delta(
        &mut self,
        post_id: PostId,
        option_id: OptionId,
        delta: i64,
    ) -> Result<bool, RepositoryError> {
        self.check(FailPoint::ApplyOptionDelta)?;
        let Some(poll) = self.poll_mut(post_id) else {
            return Ok(false);
        };
        let Some(option) = poll.options.iter_mut().find(|option| option.id == option_id) else {
            return Ok(false);
        };
        option.votes += delta;
        poll.total_votes += delta;
        Ok(true)
    }

    async fn update_poll_meta(
        &mut self,
        post_id: PostId,
        update: &PollMetaUpdate,
    ) -> Result<(), RepositoryError> {
        if let Some(poll) = self.poll_mut(post_id) {
            update.apply(poll);
        }
        Ok(())
    }

    async fn insert_poll_options(
        &mut self,
        post_id: PostId,
        options: &[PollOption],
    ) -> Result<(), RepositoryError> {
        let poll = self
            .poll_mut(post_id)
            .ok_or_else(|| RepositoryError::MissingReference("poll option".to_string()))?;
        poll.options.extend(options.iter().cloned());
        Ok(())
    }

    async fn delete_poll_options(
        &mut self,
        post_id: PostId,
        option_ids: &[OptionId],
    ) -> Result<u64, RepositoryError> {
        let Some(poll) = self.poll_mut(post_id) else {
            return Ok(0);
        };
        let before = poll.options.len();
        poll.options.retain(|option| !option_ids.contains(&option.id));
        let removed = (before - poll.options.len()) as u64;
        self.working
            .poll_votes
            .retain(|_, vote| !(vote.post_id == post_id && option_ids.contains(&vote.option_id)));
        Ok(removed)
    }

    async fn rename_poll_option(
        &mut self,
        post_id: PostId,
        option_id: OptionId,
        text: &str,
    ) -> Result<bool, RepositoryError> {
        let option = self
            .poll_mut(post_id)
            .and_then(|poll| poll.options.iter_mut().find(|option| option.id == option_id));
        Ok(match option {
            Some(option) => {
                option.text = text.to_string();
                true
            }
            None => false,
        })
    }

    async fn load_poll(&mut self, post_id: PostId) -> Result<Option<Poll>, RepositoryError> {
        Ok(self
            .working
            .targets
            .get(&post_id)
            .and_then(|target| target.poll.clone()))
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.check(FailPoint::Commit)?;
        let MemoryTallyTransaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}
