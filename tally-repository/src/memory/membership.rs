use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tally_shared::types::{Community, CommunityId, Membership, UserId};
use uuid::Uuid;

use crate::{MemberCountMirror, MembershipRepository, RepositoryError};

#[derive(Debug, Default)]
struct MembershipState {
    communities: HashMap<CommunityId, Community>,
    memberships: Vec<Membership>,
}

/// In-memory membership store and `member_count` mirror.
#[derive(Clone, Default)]
pub struct MemoryMembershipRepository {
    state: Arc<Mutex<MembershipState>>,
}

impl MemoryMembershipRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MembershipState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::unavailable("membership store lock poisoned"))
    }

    pub fn insert_community(&self, community: Community) {
        if let Ok(mut state) = self.state() {
            state.communities.insert(community.id, community);
        }
    }

    pub fn community(&self, community_id: CommunityId) -> Option<Community> {
        self.state()
            .ok()
            .and_then(|state| state.communities.get(&community_id).cloned())
    }

    /// Adds `count` memberships of fresh users to the community.
    pub fn seed_members(&self, community_id: CommunityId, count: usize) {
        if let Ok(mut state) = self.state() {
            for _ in 0..count {
                state.memberships.push(Membership {
                    id: Uuid::new_v4(),
                    user_id: Uuid::new_v4(),
                    community_id,
                    created_at: Utc::now(),
                });
            }
        }
    }

    pub fn is_member(&self, user_id: UserId, community_id: CommunityId) -> bool {
        self.state().is_ok_and(|state| {
            state
                .memberships
                .iter()
                .any(|m| m.user_id == user_id && m.community_id == community_id)
        })
    }
}

#[async_trait]
impl MembershipRepository for MemoryMembershipRepository {
    async fn insert_membership(&self, membership: &Membership) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if !state.communities.contains_key(&membership.community_id) {
            return Err(RepositoryError::MissingReference("membership".to_string()));
        }
        let duplicate = state.memberships.iter().any(|m| {
            m.id == membership.id
                || (m.user_id == membership.user_id && m.community_id == membership.community_id)
        });
        if duplicate {
            return Err(RepositoryError::Conflict("membership".to_string()));
        }
        state.memberships.push(membership.clone());
        Ok(())
    }

    async fn delete_membership(
        &self,
        user_id: UserId,
        community_id: CommunityId,
    ) -> Result<Option<Membership>, RepositoryError> {
        let mut state = self.state()?;
        let position = state
            .memberships
            .iter()
            .position(|m| m.user_id == user_id && m.community_id == community_id);
        Ok(position.map(|index| state.memberships.remove(index)))
    }

    async fn count_members(&self, community_id: CommunityId) -> Result<i64, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .memberships
            .iter()
            .filter(|m| m.community_id == community_id)
            .count() as i64)
    }
}

#[async_trait]
impl MemberCountMirror for MemoryMembershipRepository {
    async fn write_member_count(
        &self,
        community_id: CommunityId,
        count: i64,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state()?;
        Ok(match state.communities.get_mut(&community_id) {
            Some(community) => {
                community.member_count = count;
                true
            }
            None => false,
        })
    }
}
