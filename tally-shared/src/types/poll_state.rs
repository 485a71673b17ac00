use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{OptionId, Poll, PollVote, PostId};

/// Per-option view of a poll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollOptionState {
    pub id: OptionId,
    pub text: String,
    pub votes: i64,
    /// Share of the total in percent, `0.0` while the poll has no votes.
    pub percentage: f64,
}

/// The poll view returned by every poll operation.
///
/// `user_option_ids` lists the options the requesting user currently holds a
/// vote for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollState {
    pub post_id: PostId,
    pub question: String,
    pub options: Vec<PollOptionState>,
    pub total_votes: i64,
    pub user_option_ids: Vec<OptionId>,
    pub expires_at: Option<DateTime<Utc>>,
    pub allow_multiple: bool,
}

impl PollState {
    pub fn new(post_id: PostId, poll: &Poll, user_votes: &[PollVote]) -> Self {
        let options = poll
            .options
            .iter()
            .map(|option| PollOptionState {
                id: option.id,
                text: option.text.clone(),
                votes: option.votes,
                percentage: if poll.total_votes > 0 {
                    option.votes as f64 / poll.total_votes as f64 * 100.0
                } else {
                    0.0
                },
            })
            .collect();

        Self {
            post_id,
            question: poll.question.clone(),
            options,
            total_votes: poll.total_votes,
            user_option_ids: user_votes.iter().map(|vote| vote.option_id).collect(),
            expires_at: poll.expires_at,
            allow_multiple: poll.allow_multiple,
        }
    }

    pub fn option(&self, option_id: &OptionId) -> Option<&PollOptionState> {
        self.options.iter().find(|option| option.id == *option_id)
    }
}
