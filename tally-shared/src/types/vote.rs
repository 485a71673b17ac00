use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{TargetId, TargetType, UserId, VoteId};

/// A user's up/down vote on a target.
///
/// At most one vote exists per `(user_id, target_id)` pair. `value` is `true`
/// for an upvote and `false` for a downvote.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vote {
    pub id: VoteId,
    pub user_id: UserId,
    pub target_id: TargetId,
    pub target_type: TargetType,
    pub value: bool,
    pub created_at: DateTime<Utc>,
}
