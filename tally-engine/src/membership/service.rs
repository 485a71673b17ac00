use std::sync::Arc;

use chrono::Utc;
use tally_repository::{MembershipRepository, RepositoryError};
use tally_shared::types::{CommunityId, Membership, UserId};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::EngineError;
use crate::membership::{DurableWrite, MembershipCounter};
use crate::validation::ensure_id;

/// Joins and leaves communities, keeping the live member counter in step
/// with the durable memberships.
///
/// The membership write and the counter update either both happen or
/// neither does: a failed counter update is compensated by undoing the
/// membership write.
pub struct MembershipService {
    memberships: Arc<dyn MembershipRepository>,
    counter: Arc<MembershipCounter>,
}

impl MembershipService {
    pub fn new(memberships: Arc<dyn MembershipRepository>, counter: Arc<MembershipCounter>) -> Self {
        Self {
            memberships,
            counter,
        }
    }

    /// Adds `user_id` to the community and returns the new membership.
    #[instrument(skip(self))]
    pub async fn join(&self, user_id: UserId, community_id: CommunityId) -> Result<Membership, EngineError> {
        ensure_id(user_id, "user_id")?;
        ensure_id(community_id, "community_id")?;

        // Seeding before the insert keeps the new row out of the seed count.
        self.counter.ensure_seeded(community_id).await?;

        let membership = Membership {
            id: Uuid::new_v4(),
            user_id,
            community_id,
            created_at: Utc::now(),
        };
        match self.memberships.insert_membership(&membership).await {
            Ok(()) => {}
            Err(RepositoryError::Conflict(_)) => return Err(EngineError::AlreadyMember),
            Err(RepositoryError::MissingReference(_)) => {
                return Err(EngineError::not_found(format!("community {community_id}")));
            }
            Err(e) => return Err(e.into()),
        }

        match self.counter.apply(community_id, 1, DurableWrite::Applied).await {
            Ok(count) => {
                info!(%community_id, count, "User joined community");
                Ok(membership)
            }
            Err(err) => {
                warn!(error = %err, "Member counter update failed, undoing join");
                if let Err(undo) = self.memberships.delete_membership(user_id, community_id).await {
                    error!(error = %undo, "Failed to undo membership insert");
                }
                Err(err)
            }
        }
    }

    /// Removes `user_id` from the community and returns the new member count.
    #[instrument(skip(self))]
    pub async fn leave(&self, user_id: UserId, community_id: CommunityId) -> Result<i64, EngineError> {
        ensure_id(user_id, "user_id")?;
        ensure_id(community_id, "community_id")?;

        self.counter.ensure_seeded(community_id).await?;

        let membership = self
            .memberships
            .delete_membership(user_id, community_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("membership in community {community_id}")))?;

        match self.counter.apply(community_id, -1, DurableWrite::Applied).await {
            Ok(count) => {
                info!(%community_id, count, "User left community");
                Ok(count)
            }
            Err(err) => {
                warn!(error = %err, "Member counter update failed, undoing leave");
                if let Err(undo) = self.memberships.insert_membership(&membership).await {
                    error!(error = %undo, "Failed to restore membership");
                }
                Err(err)
            }
        }
    }
}
