//! PostgreSQL implementation of the tally store.
//!
//! Each [`PostgresTallyTransaction`] wraps one `sqlx::Transaction`. Target rows
//! are locked with `SELECT .. FOR UPDATE`, counters move through relative
//! `UPDATE .. SET x = x + $n` statements, and aggregates are read back with
//! `RETURNING` inside the same transaction.
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row};
use tally_shared::types::{
    AggregateScore, OptionId, Poll, PollMetaUpdate, PollOption, PollVote, PostId, ScoreDelta,
    Target, TargetId, TargetType, UserId, Vote, VoteId,
};
use uuid::Uuid;

use crate::{RepositoryError, TallyRepository, TallyTransaction};

/// PostgreSQL backed [`TallyRepository`].
///
/// ## Features
///
/// - One `sqlx::Transaction` per unit of work, rolled back on drop
/// - Target and poll rows locked with `SELECT .. FOR UPDATE`
/// - Relative counter updates read back with `RETURNING`
/// - Bulk option inserts through `QueryBuilder`
pub struct PostgresTallyRepository {
    pool: sqlx::PgPool,
}

impl PostgresTallyRepository {
    /// Creates a new PostgreSQL tally repository.
    ///
    /// # Arguments
    ///
    /// * `pool` - Connection pool over a database migrated with [`crate::MIGRATOR`]
    ///
    /// # Returns
    ///
    /// * `Ok(PostgresTallyRepository)` - Ready-to-use repository instance
    /// * `Err(RepositoryError)` - Reserved for future validation (currently always succeeds)
    pub async fn new(pool: sqlx::PgPool) -> Result<Self, RepositoryError> {
        Ok(Self { pool })
    }
}

#[async_trait]
impl TallyRepository for PostgresTallyRepository {
    async fn begin(&self) -> Result<Box<dyn TallyTransaction>, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTallyTransaction { tx }))
    }
}

/// An open PostgreSQL transaction. Rolled back by sqlx when dropped.
pub struct PostgresTallyTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

fn target_type_from_row(row: &PgRow) -> Result<TargetType, RepositoryError> {
    let raw: i16 = row.try_get("target_type")?;
    TargetType::from_i16(raw)
        .ok_or_else(|| RepositoryError::invalid_data(format!("unknown target type {raw}")))
}

fn vote_from_row(row: &PgRow) -> Result<Vote, RepositoryError> {
    Ok(Vote {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        target_id: row.try_get("target_id")?,
        target_type: target_type_from_row(row)?,
        value: row.try_get("value")?,
        created_at: row.try_get("created_at")?,
    })
}

fn poll_vote_from_row(row: &PgRow) -> Result<PollVote, RepositoryError> {
    Ok(PollVote {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        user_id: row.try_get("user_id")?,
        option_id: row.try_get("option_id")?,
        created_at: row.try_get("created_at")?,
    })
}

impl PostgresTallyTransaction {
    async fn fetch_poll(&mut self, post_id: PostId, lock: bool) -> Result<Option<Poll>, RepositoryError> {
        let sql = if lock {
            "SELECT question, total_votes, expires_at, allow_multiple FROM polls WHERE post_id = $1 FOR UPDATE"
        } else {
            "SELECT question, total_votes, expires_at, allow_multiple FROM polls WHERE post_id = $1"
        };
        let Some(row) = sqlx::query(sql)
            .bind(post_id)
            .fetch_optional(&mut *self.tx)
            .await?
        else {
            return Ok(None);
        };

        let options = sqlx::query(
            r#"
            SELECT id, text, votes
            FROM poll_options
            WHERE post_id = $1
            ORDER BY position
            "#,
        )
        .bind(post_id)
        .fetch_all(&mut *self.tx)
        .await?
        .iter()
        .map(|option| {
            Ok(PollOption {
                id: option.try_get("id")?,
                text: option.try_get("text")?,
                votes: option.try_get("votes")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(Some(Poll {
            question: row.try_get("question")?,
            options,
            total_votes: row.try_get("total_votes")?,
            expires_at: row.try_get("expires_at")?,
            allow_multiple: row.try_get("allow_multiple")?,
        }))
    }
}

#[async_trait]
impl TallyTransaction for PostgresTallyTransaction {
    async fn lock_target(&mut self, target_id: TargetId) -> Result<Option<Target>, RepositoryError> {
        let Some(row) = sqlx::query(
            r#"
            SELECT id, target_type, author_id, community_id, upvotes, downvotes
            FROM targets
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(target_id)
        .fetch_optional(&mut *self.tx)
        .await?
        else {
            return Ok(None);
        };

        let poll = self.fetch_poll(target_id, true).await?;

        Ok(Some(Target {
            id: row.try_get("id")?,
            target_type: target_type_from_row(&row)?,
            author_id: row.try_get("author_id")?,
            community_id: row.try_get("community_id")?,
            score: AggregateScore::new(row.try_get("upvotes")?, row.try_get("downvotes")?),
            poll,
        }))
    }

    async fn find_vote(
        &mut self,
        user_id: UserId,
        target_id: TargetId,
    ) -> Result<Option<Vote>, RepositoryError> {
        sqlx::query(
            r#"
            SELECT id, user_id, target_id, target_type, value, created_at
            FROM votes
            WHERE user_id = $1 AND target_id = $2
            "#,
        )
        .bind(user_id)
        .bind(target_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .as_ref()
        .map(vote_from_row)
        .transpose()
    }

    async fn insert_vote(&mut self, vote: &Vote) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO votes (id, user_id, target_id, target_type, value, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(vote.id)
        .bind(vote.user_id)
        .bind(vote.target_id)
        .bind(vote.target_type.as_i16())
        .bind(vote.value)
        .bind(vote.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| RepositoryError::from_sqlx(e, "vote"))?;
        Ok(())
    }

    async fn update_vote_value(&mut self, vote_id: VoteId, value: bool) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE votes SET value = $2 WHERE id = $1")
            .bind(vote_id)
            .bind(value)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_vote(&mut self, vote_id: VoteId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM votes WHERE id = $1")
            .bind(vote_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn apply_score_delta(
        &mut self,
        target_id: TargetId,
        delta: ScoreDelta,
    ) -> Result<Option<AggregateScore>, RepositoryError> {
        let row = sqlx::query(
            r#"
            UPDATE targets
            SET upvotes = upvotes + $2,
                downvotes = downvotes + $3
            WHERE id = $1
            RETURNING upvotes, downvotes
            "#,
        )
        .bind(target_id)
        .bind(delta.up)
        .bind(delta.down)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(|row| -> Result<AggregateScore, RepositoryError> {
            Ok(AggregateScore::new(row.try_get("upvotes")?, row.try_get("downvotes")?))
        })
        .transpose()
    }

    async fn find_poll_votes(
        &mut self,
        post_id: PostId,
        user_id: UserId,
    ) -> Result<Vec<PollVote>, RepositoryError> {
        sqlx::query(
            r#"
            SELECT id, post_id, user_id, option_id, created_at
            FROM poll_votes
            WHERE post_id = $1 AND user_id = $2
            ORDER BY created_at
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?
        .iter()
        .map(poll_vote_from_row)
        .collect()
    }

    async fn insert_poll_vote(&mut self, vote: &PollVote) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO poll_votes (id, post_id, user_id, option_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(vote.id)
        .bind(vote.post_id)
        .bind(vote.user_id)
        .bind(vote.option_id)
        .bind(vote.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| RepositoryError::from_sqlx(e, "poll vote"))?;
        Ok(())
    }

    async fn delete_poll_votes(&mut self, post_id: PostId, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM poll_votes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn apply_option_delta(
        &mut self,
        post_id: PostId,
        option_id: OptionId,
        delta: i64,
    ) -> Result<bool, RepositoryError> {
        let row = sqlx::query(
            r#"
            WITH option_update AS (
                UPDATE poll_options
                SET votes = votes + $3
                WHERE id = $2 AND post_id = $1
                RETURNING id
            )
            UPDATE polls
            SET total_votes = total_votes + $3
            WHERE post_id = $1 AND EXISTS (SELECT 1 FROM option_update)
            RETURNING post_id
            "#,
        )
        .bind(post_id)
        .bind(option_id)
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.is_some())
    }

    async fn update_poll_meta(
        &mut self,
        post_id: PostId,
        update: &PollMetaUpdate,
    ) -> Result<(), RepositoryError> {
        if update.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            UPDATE polls
            SET question = COALESCE($2, question),
                expires_at = COALESCE($3, expires_at),
                allow_multiple = COALESCE($4, allow_multiple)
            WHERE post_id = $1
            "#,
        )
        .bind(post_id)
        .bind(update.question.as_deref())
        .bind(update.expires_at)
        .bind(update.allow_multiple)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_poll_options(
        &mut self,
        post_id: PostId,
        options: &[PollOption],
    ) -> Result<(), RepositoryError> {
        if options.is_empty() {
            return Ok(());
        }

        let next_position: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM poll_options WHERE post_id = $1",
        )
        .bind(post_id)
        .fetch_one(&mut *self.tx)
        .await?;

        let mut query_builder =
            sqlx::QueryBuilder::<Postgres>::new("INSERT INTO poll_options (id, post_id, position, text, votes)");
        query_builder.push_values(options.iter().enumerate(), |mut b, (offset, option)| {
            b.push_bind(option.id)
                .push_bind(post_id)
                .push_bind(next_position + offset as i32)
                .push_bind(option.text.clone())
                .push_bind(option.votes);
        });
        query_builder
            .build()
            .execute(&mut *self.tx)
            .await
            .map_err(|e| RepositoryError::from_sqlx(e, "poll option"))?;
        Ok(())
    }

    async fn delete_poll_options(
        &mut self,
        post_id: PostId,
        option_ids: &[OptionId],
    ) -> Result<u64, RepositoryError> {
        if option_ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<Uuid> = option_ids.to_vec();
        let result = sqlx::query("DELETE FROM poll_options WHERE post_id = $1 AND id = ANY($2)")
            .bind(post_id)
            .bind(ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn rename_poll_option(
        &mut self,
        post_id: PostId,
        option_id: OptionId,
        text: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE poll_options SET text = $3 WHERE post_id = $1 AND id = $2")
            .bind(post_id)
            .bind(option_id)
            .bind(text)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn load_poll(&mut self, post_id: PostId) -> Result<Option<Poll>, RepositoryError> {
        self.fetch_poll(post_id, false).await
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}
