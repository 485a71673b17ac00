use std::sync::Arc;

use chrono::Utc;
use tally_repository::{TallyRepository, TallyTransaction};
use tally_shared::types::{
    OptionId, Poll, PollMetaUpdate, PollOption, PollState, PollVote, PostId, UserId,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::EngineError;
use crate::validation::{MIN_OPTIONS, ensure_id, ensure_option_text, ensure_question};

/// Applies poll votes and structural poll edits.
pub struct PollEngine {
    repository: Arc<dyn TallyRepository>,
}

/// Locks the post and returns its poll.
async fn lock_poll(tx: &mut dyn TallyTransaction, post_id: PostId) -> Result<(Uuid, Poll), EngineError> {
    let target = tx
        .lock_target(post_id)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("post {post_id}")))?;
    let poll = target
        .poll
        .ok_or_else(|| EngineError::invalid_input(format!("post {post_id} has no poll")))?;
    Ok((target.author_id, poll))
}

async fn load_state(
    tx: &mut dyn TallyTransaction,
    post_id: PostId,
    user_id: UserId,
) -> Result<PollState, EngineError> {
    let poll = tx
        .load_poll(post_id)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("poll on post {post_id}")))?;
    let votes = tx.find_poll_votes(post_id, user_id).await?;
    Ok(PollState::new(post_id, &poll, &votes))
}

async fn move_option(
    tx: &mut dyn TallyTransaction,
    post_id: PostId,
    option_id: OptionId,
    delta: i64,
) -> Result<(), EngineError> {
    if !tx.apply_option_delta(post_id, option_id, delta).await? {
        return Err(EngineError::not_found(format!("poll option {option_id}")));
    }
    Ok(())
}

impl PollEngine {
    pub fn new(repository: Arc<dyn TallyRepository>) -> Self {
        Self { repository }
    }

    /// Records `user_id`'s vote for `option_id`.
    ///
    /// On a single-select poll any vote the user already holds is moved to
    /// the new option.
    #[instrument(skip(self))]
    pub async fn cast_poll_vote(
        &self,
        user_id: UserId,
        post_id: PostId,
        option_id: OptionId,
    ) -> Result<PollState, EngineError> {
        ensure_id(user_id, "user_id")?;
        ensure_id(post_id, "post_id")?;
        ensure_id(option_id, "option_id")?;

        let mut tx = self.repository.begin().await?;
        let (_, poll) = lock_poll(tx.as_mut(), post_id).await?;

        if poll.option(&option_id).is_none() {
            return Err(EngineError::not_found(format!("poll option {option_id}")));
        }
        if poll.is_closed(Utc::now()) {
            return Err(EngineError::PollClosed);
        }

        let existing = tx.find_poll_votes(post_id, user_id).await?;
        if existing.iter().any(|vote| vote.option_id == option_id) {
            return Err(EngineError::AlreadyVoted);
        }

        if !poll.allow_multiple && !existing.is_empty() {
            tx.delete_poll_votes(post_id, user_id).await?;
            for vote in &existing {
                move_option(tx.as_mut(), post_id, vote.option_id, -1).await?;
            }
        }

        let vote = PollVote {
            id: Uuid::new_v4(),
            post_id,
            user_id,
            option_id,
            created_at: Utc::now(),
        };
        tx.insert_poll_vote(&vote).await?;
        move_option(tx.as_mut(), post_id, option_id, 1).await?;

        let state = load_state(tx.as_mut(), post_id, user_id).await?;
        tx.commit().await?;

        debug!(total_votes = state.total_votes, "Poll vote recorded");
        Ok(state)
    }

    /// Removes every vote `user_id` holds on the poll. A user without votes
    /// gets the current state back unchanged.
    #[instrument(skip(self))]
    pub async fn retract_poll_votes(
        &self,
        user_id: UserId,
        post_id: PostId,
    ) -> Result<PollState, EngineError> {
        ensure_id(user_id, "user_id")?;
        ensure_id(post_id, "post_id")?;

        let mut tx = self.repository.begin().await?;
        lock_poll(tx.as_mut(), post_id).await?;

        let existing = tx.find_poll_votes(post_id, user_id).await?;
        if existing.is_empty() {
            return load_state(tx.as_mut(), post_id, user_id).await;
        }

        tx.delete_poll_votes(post_id, user_id).await?;
        for vote in &existing {
            move_option(tx.as_mut(), post_id, vote.option_id, -1).await?;
        }

        let state = load_state(tx.as_mut(), post_id, user_id).await?;
        tx.commit().await?;

        debug!(removed = existing.len(), total_votes = state.total_votes, "Poll votes retracted");
        Ok(state)
    }

    pub async fn user_poll_votes(
        &self,
        user_id: UserId,
        post_id: PostId,
    ) -> Result<Vec<PollVote>, EngineError> {
        ensure_id(user_id, "user_id")?;
        ensure_id(post_id, "post_id")?;

        let mut tx = self.repository.begin().await?;
        Ok(tx.find_poll_votes(post_id, user_id).await?)
    }

    /// The poll as seen by `user_id`. Reads without taking the poll lock.
    pub async fn poll_state(&self, user_id: UserId, post_id: PostId) -> Result<PollState, EngineError> {
        ensure_id(post_id, "post_id")?;

        let mut tx = self.repository.begin().await?;
        load_state(tx.as_mut(), post_id, user_id).await
    }

    /// Whether structural edits are still allowed, i.e. nobody has voted.
    ///
    /// The answer is advisory: edits re-check it under the poll lock.
    pub async fn can_edit_poll(&self, post_id: PostId) -> Result<bool, EngineError> {
        ensure_id(post_id, "post_id")?;

        let mut tx = self.repository.begin().await?;
        let poll = tx
            .load_poll(post_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("poll on post {post_id}")))?;
        Ok(poll.can_edit())
    }

    /// Opens an edit transaction once the actor and the freeze rule allow it.
    /// The poll stays locked until the returned transaction ends.
    async fn begin_edit(
        &self,
        actor_id: UserId,
        post_id: PostId,
    ) -> Result<Box<dyn TallyTransaction>, EngineError> {
        let mut tx = self.repository.begin().await?;
        let (author_id, poll) = lock_poll(tx.as_mut(), post_id).await?;
        if author_id != actor_id {
            return Err(EngineError::PermissionDenied);
        }
        if !poll.can_edit() {
            return Err(EngineError::PollCannotEdit);
        }
        Ok(tx)
    }

    async fn finish_edit(
        mut tx: Box<dyn TallyTransaction>,
        actor_id: UserId,
        post_id: PostId,
    ) -> Result<PollState, EngineError> {
        let state = load_state(tx.as_mut(), post_id, actor_id).await?;
        tx.commit().await?;
        info!(%post_id, options = state.options.len(), "Poll edited");
        Ok(state)
    }

    /// Changes the question, expiry or multi-select flag. Fields left `None`
    /// keep their value.
    #[instrument(skip(self, update))]
    pub async fn update_poll_meta(
        &self,
        actor_id: UserId,
        post_id: PostId,
        update: PollMetaUpdate,
    ) -> Result<PollState, EngineError> {
        ensure_id(actor_id, "actor_id")?;
        ensure_id(post_id, "post_id")?;
        if let Some(question) = &update.question {
            ensure_question(question)?;
        }

        let mut tx = self.begin_edit(actor_id, post_id).await?;
        if !update.is_empty() {
            tx.update_poll_meta(post_id, &update).await?;
        }
        Self::finish_edit(tx, actor_id, post_id).await
    }

    #[instrument(skip(self, texts))]
    pub async fn add_options(
        &self,
        actor_id: UserId,
        post_id: PostId,
        texts: Vec<String>,
    ) -> Result<PollState, EngineError> {
        ensure_id(actor_id, "actor_id")?;
        ensure_id(post_id, "post_id")?;
        if texts.is_empty() {
            return Err(EngineError::invalid_input("at least one option is required"));
        }
        for text in &texts {
            ensure_option_text(text)?;
        }

        let options: Vec<PollOption> = texts.into_iter().map(PollOption::new).collect();
        let mut tx = self.begin_edit(actor_id, post_id).await?;
        tx.insert_poll_options(post_id, &options).await?;
        Self::finish_edit(tx, actor_id, post_id).await
    }

    /// Removes options. Every id must belong to the poll, and at least
/// two options must remain.
    #[instrument(skip(self))]
    pub async fn remove_options(
        &self,
        actor_id: UserId,
        post_id: PostId,
        option_ids: Vec<OptionId>,
    ) -> Result<PollState, EngineError> {
        ensure_id(actor_id, "actor_id")?;
        ensure_id(post_id, "post_id")?;
        if option_ids.is_empty() {
            return Err(EngineError::invalid_input("at least one option id is required"));
        }
        for option_id in &option_ids {
            ensure_id(*option_id, "option_id")?;
        }

        let mut tx = self.begin_edit(actor_id, post_id).await?;
        let poll = tx
            .load_poll(post_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("poll on post {post_id}")))?;
        if let Some(missing) = option_ids.iter().find(|id| poll.option(id).is_none()) {
            return Err(EngineError::not_found(format!("poll option {missing}")));
        }
        let remaining = poll
            .options
            .iter()
            .filter(|option| !option_ids.contains(&option.id))
            .count();
        if remaining < MIN_OPTIONS {
            return Err(EngineError::invalid_input(format!(
                "a poll needs at least {MIN_OPTIONS} options"
            )));
        }
        tx.delete_poll_options(post_id, &option_ids).await?;
        Self::finish_edit(tx, actor_id, post_id).await
    }

    #[instrument(skip(self, text))]
    pub async fn rename_option(
        &self,
        actor_id: UserId,
        post_id: PostId,
        option_id: OptionId,
        text: String,
    ) -> Result<PollState, EngineError> {
        ensure_id(actor_id, "actor_id")?;
        ensure_id(post_id, "post_id")?;
        ensure_id(option_id, "option_id")?;
        ensure_option_text(&text)?;

        let mut tx = self.begin_edit(actor_id, post_id).await?;
        if !tx.rename_poll_option(post_id, option_id, &text).await? {
            return Err(EngineError::not_found(format!("poll option {option_id}")));
        }
        Self::finish_edit(tx, actor_id, post_id).await
    }
}
