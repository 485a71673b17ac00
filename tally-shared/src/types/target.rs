use serde::{Deserialize, Serialize};
use std::ops::Add;

use crate::types::{CommunityId, Poll, TargetId, UserId};

/// The kind of content a vote is cast on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TargetType {
    Post,
    Comment,
}

impl TargetType {
    /// Stable numeric encoding used by the persistence layer.
    pub fn as_i16(self) -> i16 {
        match self {
            TargetType::Post => 0,
            TargetType::Comment => 1,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(TargetType::Post),
            1 => Some(TargetType::Comment),
            _ => None,
        }
    }
}

/// Aggregated up/down tally stored on a target.
///
/// Only the vote engine writes these fields, and only through relative
/// [`ScoreDelta`] updates.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregateScore {
    pub up: i64,
    pub down: i64,
}

impl AggregateScore {
    pub fn new(up: i64, down: i64) -> Self {
        Self { up, down }
    }

    /// Net score shown to readers.
    pub fn score(&self) -> i64 {
        self.up - self.down
    }

    /// Number of votes this tally accounts for.
    pub fn total(&self) -> i64 {
        self.up + self.down
    }
}

/// A relative change to an [`AggregateScore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreDelta {
    pub up: i64,
    pub down: i64,
}

impl ScoreDelta {
    pub fn is_zero(&self) -> bool {
        self.up == 0 && self.down == 0
    }
}

impl Add<ScoreDelta> for AggregateScore {
    type Output = AggregateScore;

    fn add(self, delta: ScoreDelta) -> AggregateScore {
        AggregateScore {
            up: self.up + delta.up,
            down: self.down + delta.down,
        }
    }
}

/// A post or comment that can receive votes.
///
/// Posts of poll type additionally embed a [`Poll`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Target {
    pub id: TargetId,
    pub target_type: TargetType,
    pub author_id: UserId,
    pub community_id: Option<CommunityId>,
    pub score: AggregateScore,
    pub poll: Option<Poll>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_is_up_minus_down() {
        let score = AggregateScore::new(7, 3);
        assert_eq!(score.score(), 4);
        assert_eq!(score.total(), 10);
    }

    #[test]
    fn test_apply_delta() {
        let score = AggregateScore::new(1, 0) + ScoreDelta { up: -1, down: 1 };
        assert_eq!(score, AggregateScore::new(0, 1));
    }

    #[test]
    fn test_target_type_encoding() {
        for target_type in [TargetType::Post, TargetType::Comment] {
            assert_eq!(TargetType::from_i16(target_type.as_i16()), Some(target_type));
        }
        assert_eq!(TargetType::from_i16(7), None);
    }
}
