use async_trait::async_trait;
use tally_shared::types::{CommunityId, Membership, UserId};

use crate::errors::RepositoryError;

/// Durable membership records, the source of truth for member counts.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Fails with [`RepositoryError::Conflict`] on a duplicate membership and
    /// with [`RepositoryError::MissingReference`] if the community is unknown.
    async fn insert_membership(&self, membership: &Membership) -> Result<(), RepositoryError>;

    /// Removes the membership and returns it, or `None` if there was none.
    async fn delete_membership(
        &self,
        user_id: UserId,
        community_id: CommunityId,
    ) -> Result<Option<Membership>, RepositoryError>;

    async fn count_members(&self, community_id: CommunityId) -> Result<i64, RepositoryError>;
}

/// Write access to the durable `member_count` mirror.
///
/// Only the reconciliation worker holds one of these.
#[async_trait]
pub trait MemberCountMirror: Send + Sync {
    /// Returns `false` if the community does not exist.
    async fn write_member_count(
        &self,
        community_id: CommunityId,
        count: i64,
    ) -> Result<bool, RepositoryError>;
}
