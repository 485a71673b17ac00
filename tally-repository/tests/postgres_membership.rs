//! Integration tests for PostgreSQL membership persistence.
//!
//! Run with: `DATABASE_URL=postgres://.. cargo test --test postgres_membership -- --ignored`

use chrono::Utc;
use tally_repository::{
    MemberCountMirror, MembershipRepository, PostgresMembershipRepository, RepositoryError,
};
use tally_shared::types::Membership;
use uuid::Uuid;

async fn insert_community(pool: &sqlx::PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO communities (id, name) VALUES ($1, $2)")
        .bind(id)
        .bind("rustaceans")
        .execute(pool)
        .await
        .unwrap();
    id
}

fn make_membership(community_id: Uuid) -> Membership {
    Membership {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        community_id,
        created_at: Utc::now(),
    }
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_insert_count_and_delete(pool: sqlx::PgPool) {
    let repository = PostgresMembershipRepository::new(pool.clone()).await.unwrap();
    let community_id = insert_community(&pool).await;
    let membership = make_membership(community_id);

    repository.insert_membership(&membership).await.unwrap();
    repository
        .insert_membership(&make_membership(community_id))
        .await
        .unwrap();
    assert_eq!(repository.count_members(community_id).await.unwrap(), 2);

    let removed = repository
        .delete_membership(membership.user_id, community_id)
        .await
        .unwrap();
    assert_eq!(removed.map(|m| m.id), Some(membership.id));
    assert_eq!(repository.count_members(community_id).await.unwrap(), 1);
    assert!(repository
        .delete_membership(membership.user_id, community_id)
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_constraint_violations_are_typed(pool: sqlx::PgPool) {
    let repository = PostgresMembershipRepository::new(pool.clone()).await.unwrap();
    let community_id = insert_community(&pool).await;
    let membership = make_membership(community_id);
    repository.insert_membership(&membership).await.unwrap();

    let duplicate = Membership {
        id: Uuid::new_v4(),
        ..membership
    };
    assert!(matches!(
        repository.insert_membership(&duplicate).await,
        Err(RepositoryError::Conflict(_))
    ));
    assert!(matches!(
        repository.insert_membership(&make_membership(Uuid::new_v4())).await,
        Err(RepositoryError::MissingReference(_))
    ));
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_write_member_count(pool: sqlx::PgPool) {
    let repository = PostgresMembershipRepository::new(pool.clone()).await.unwrap();
    let community_id = insert_community(&pool).await;

    assert!(repository.write_member_count(community_id, 5).await.unwrap());
    assert!(!repository.write_member_count(Uuid::new_v4(), 5).await.unwrap());

    let stored: i64 = sqlx::query_scalar("SELECT member_count FROM communities WHERE id = $1")
        .bind(community_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, 5);
}
