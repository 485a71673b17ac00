use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{OptionId, PollVoteId, PostId, UserId};

/// A single choice of a poll together with its tally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollOption {
    pub id: OptionId,
    pub text: String,
    pub votes: i64,
}

impl PollOption {
    /// Creates a fresh option with no votes.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: OptionId::new_v4(),
            text: text.into(),
            votes: 0,
        }
    }
}

/// A poll embedded in a post.
///
/// `total_votes` always equals the sum of the option tallies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Poll {
    pub question: String,
    pub options: Vec<PollOption>,
    pub total_votes: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub allow_multiple: bool,
}

impl Poll {
    /// Structural edits are only allowed before the first vote.
    pub fn can_edit(&self) -> bool {
        self.total_votes == 0
    }

    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    pub fn option(&self, option_id: &OptionId) -> Option<&PollOption> {
        self.options.iter().find(|option| option.id == *option_id)
    }

    /// Sum of the per-option tallies.
    pub fn options_total(&self) -> i64 {
        self.options.iter().map(|option| option.votes).sum()
    }
}

/// A user's vote for one option of a poll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollVote {
    pub id: PollVoteId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub option_id: OptionId,
    pub created_at: DateTime<Utc>,
}

/// Partial update of a poll's metadata. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollMetaUpdate {
    pub question: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub allow_multiple: Option<bool>,
}

impl PollMetaUpdate {
    pub fn is_empty(&self) -> bool {
        self.question.is_none() && self.expires_at.is_none() && self.allow_multiple.is_none()
    }

    pub fn apply(&self, poll: &mut Poll) {
        if let Some(question) = &self.question {
            poll.question = question.clone();
        }
        if let Some(expires_at) = self.expires_at {
            poll.expires_at = Some(expires_at);
        }
        if let Some(allow_multiple) = self.allow_multiple {
            poll.allow_multiple = allow_multiple;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn poll_with_votes(votes: &[i64]) -> Poll {
        let options: Vec<PollOption> = votes
            .iter()
            .map(|v| PollOption {
                votes: *v,
                ..PollOption::new("option")
            })
            .collect();
        Poll {
            question: "Which one?".to_string(),
            total_votes: votes.iter().sum(),
            options,
            expires_at: None,
            allow_multiple: false,
        }
    }

    #[test]
    fn test_can_edit_only_without_votes() {
        assert!(poll_with_votes(&[0, 0]).can_edit());
        assert!(!poll_with_votes(&[1, 0]).can_edit());
    }

    #[test]
    fn test_is_closed() {
        let now = Utc::now();
        let mut poll = poll_with_votes(&[0]);
        assert!(!poll.is_closed(now));
        poll.expires_at = Some(now - Duration::minutes(1));
        assert!(poll.is_closed(now));
        poll.expires_at = Some(now + Duration::minutes(1));
        assert!(!poll.is_closed(now));
    }

    #[test]
    fn test_meta_update_leaves_unset_fields() {
        let mut poll = poll_with_votes(&[0, 0]);
        let update = PollMetaUpdate {
            allow_multiple: Some(true),
            ..Default::default()
        };
        update.apply(&mut poll);
        assert!(poll.allow_multiple);
        assert_eq!(poll.question, "Which one?");
        assert!(PollMetaUpdate::default().is_empty());
    }
}
