//! Contract tests for the in-memory tally store.

use chrono::Utc;
use tally_repository::{FailPoint, MemoryTallyRepository, RepositoryError, TallyRepository};
use tally_shared::types::{AggregateScore, ScoreDelta, Target, TargetType, Vote};
use uuid::Uuid;

fn make_target() -> Target {
    Target {
        id: Uuid::new_v4(),
        target_type: TargetType::Post,
        author_id: Uuid::new_v4(),
        community_id: None,
        score: AggregateScore::default(),
        poll: None,
    }
}

fn make_vote(target_id: Uuid) -> Vote {
    Vote {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        target_id,
        target_type: TargetType::Post,
        value: true,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_commit_publishes_changes() {
    let repository = MemoryTallyRepository::new();
    let target = make_target();
    repository.insert_target(target.clone()).await;

    let mut tx = repository.begin().await.unwrap();
    tx.insert_vote(&make_vote(target.id)).await.unwrap();
    tx.apply_score_delta(target.id, ScoreDelta { up: 1, down: 0 })
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(repository.target(target.id).await.unwrap().score.up, 1);
    assert_eq!(repository.votes_on(target.id).await.len(), 1);
}

#[tokio::test]
async fn test_drop_discards_changes() {
    let repository = MemoryTallyRepository::new();
    let target = make_target();
    repository.insert_target(target.clone()).await;

    let mut tx = repository.begin().await.unwrap();
    tx.insert_vote(&make_vote(target.id)).await.unwrap();
    drop(tx);

    assert!(repository.votes_on(target.id).await.is_empty());
}

#[tokio::test]
async fn test_fail_point_fires_once() {
    let repository = MemoryTallyRepository::new();
    let target = make_target();
    repository.insert_target(target.clone()).await;
    repository.fail_once(FailPoint::Commit);

    let tx = repository.begin().await.unwrap();
    assert!(matches!(tx.commit().await, Err(RepositoryError::Unavailable(_))));

    let tx = repository.begin().await.unwrap();
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn test_unique_vote_per_user_and_target() {
    let repository = MemoryTallyRepository::new();
    let target = make_target();
    repository.insert_target(target.clone()).await;
    let vote = make_vote(target.id);

    let mut tx = repository.begin().await.unwrap();
    tx.insert_vote(&vote).await.unwrap();
    let again = Vote {
        id: Uuid::new_v4(),
        ..vote
    };
    assert!(matches!(tx.insert_vote(&again).await, Err(RepositoryError::Conflict(_))));
    assert!(matches!(
        tx.insert_vote(&make_vote(Uuid::new_v4())).await,
        Err(RepositoryError::MissingReference(_))
    ));
}
