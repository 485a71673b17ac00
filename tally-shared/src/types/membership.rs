use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CommunityId, MembershipId, UserId};

/// A user's membership in a community.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Membership {
    pub id: MembershipId,
    pub user_id: UserId,
    pub community_id: CommunityId,
    pub created_at: DateTime<Utc>,
}

/// The durable community record.
///
/// `member_count` is a mirror of the cached counter and may lag behind it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Community {
    pub id: CommunityId,
    pub name: String,
    pub member_count: i64,
}
