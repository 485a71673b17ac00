//! PostgreSQL implementation of membership persistence and of the durable
//! `communities.member_count` mirror.
use async_trait::async_trait;
use sqlx::Row;
use tally_shared::types::{CommunityId, Membership, UserId};

use crate::{MemberCountMirror, MembershipRepository, RepositoryError};

/// PostgreSQL backed [`MembershipRepository`] and [`MemberCountMirror`].
///
/// Membership rows are the source of truth for member counts; the
/// `communities.member_count` column is only ever written by reconciliation.
pub struct PostgresMembershipRepository {
    pool: sqlx::PgPool,
}

impl PostgresMembershipRepository {
    /// Creates a new PostgreSQL membership repository.
    ///
    /// # Arguments
    ///
    /// * `pool` - Connection pool over a database migrated with [`crate::MIGRATOR`]
    ///
    /// # Returns
    ///
    /// * `Ok(PostgresMembershipRepository)` - Ready-to-use repository instance
    /// * `Err(RepositoryError)` - Reserved for future validation (currently always succeeds)
    pub async fn new(pool: sqlx::PgPool) -> Result<Self, RepositoryError> {
        Ok(Self { pool })
    }
}

#[async_trait]
impl MembershipRepository for PostgresMembershipRepository {
    async fn insert_membership(&self, membership: &Membership) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO memberships (id, user_id, community_id, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(membership.id)
        .bind(membership.user_id)
        .bind(membership.community_id)
        .bind(membership.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_sqlx(e, "membership"))?;
        Ok(())
    }

    async fn delete_membership(
        &self,
        user_id: UserId,
        community_id: CommunityId,
    ) -> Result<Option<Membership>, RepositoryError> {
        let row = sqlx::query(
            r#"
            DELETE FROM memberships
            WHERE user_id = $1 AND community_id = $2
            RETURNING id, user_id, community_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(community_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<Membership, RepositoryError> {
            Ok(Membership {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                community_id: row.try_get("community_id")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .transpose()
    }

    async fn count_members(&self, community_id: CommunityId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memberships WHERE community_id = $1")
            .bind(community_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl MemberCountMirror for PostgresMembershipRepository {
    async fn write_member_count(
        &self,
        community_id: CommunityId,
        count: i64,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE communities SET member_count = $2 WHERE id = $1")
            .bind(community_id)
            .bind(count)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
