//! PostgreSQL integration tests
//!
//! Need a reachable `DATABASE_URL`. Run with: cargo test -- --ignored

use chrono::Utc;
use uuid::Uuid;

use eventkeep::aggregate::{Aggregate, AggregateCache, AggregateRepository, User, UserStatus};
use eventkeep::event_store::{EventStore, NewEvent, PgEventStore};
use eventkeep::projection::{
    PgUserProfileStore, ProjectionError, UserProfile, UserProfilePatch, UserProfileStore,
};
use eventkeep::snapshot::{SnapshotPolicy, SnapshotStore};

mod common;

fn raw_event(aggregate_id: Uuid, version: i64) -> NewEvent {
    NewEvent {
        aggregate_type: "User".to_string(),
        aggregate_id,
        aggregate_version: version,
        name: "UserUpdated".to_string(),
        schema_version: 1,
        payload: serde_json::json!({
            "user_id": aggregate_id,
            "changes": { "display_name": format!("v{}", version) },
            "updated_at": Utc::now(),
        }),
    }
}

#[tokio::test]
#[ignore]
async fn test_append_and_load_tail() {
    let pool = common::setup_test_db().await;
    let store = PgEventStore::new(pool);
    let id = Uuid::new_v4();

    let recorded = store
        .append(id, &[raw_event(id, 1), raw_event(id, 2)])
        .await
        .unwrap();
    assert_eq!(recorded.len(), 2);
    assert!(recorded[0].sequence < recorded[1].sequence);

    let tail = store.load_tail(id, 1).await.unwrap();
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].aggregate_version, 2);
}

#[tokio::test]
#[ignore]
async fn test_conflicting_batch_leaves_log_unchanged() {
    let pool = common::setup_test_db().await;
    let store = PgEventStore::new(pool);
    let id = Uuid::new_v4();
    store.append(id, &[raw_event(id, 1)]).await.unwrap();

    // Version 2 is free, version 1 is taken: nothing may be written
    let result = store.append(id, &[raw_event(id, 1), raw_event(id, 2)]).await;

    assert!(result.is_err_and(|e| e.is_concurrency_conflict()));
    assert_eq!(store.load_tail(id, 0).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore]
async fn test_list_aggregate_ids_is_distinct() {
    let pool = common::setup_test_db().await;
    let store = PgEventStore::new(pool);
    let id = Uuid::new_v4();
    store.append(id, &[raw_event(id, 1), raw_event(id, 2)]).await.unwrap();

    let mut found = 0;
    let mut offset = 0;
    loop {
        let ids = store.list_aggregate_ids("User", offset, 100).await.unwrap();
        if ids.is_empty() {
            break;
        }
        found += ids.iter().filter(|other| **other == id).count();
        offset += ids.len() as i64;
    }

    assert_eq!(found, 1);
}

#[tokio::test]
#[ignore]
async fn test_repository_snapshots_and_rebuilds() {
    let pool = common::setup_test_db().await;
    let store = PgEventStore::with_policy(pool, SnapshotPolicy::Replace);
    let repo = AggregateRepository::<User>::with_store(store.clone(), AggregateCache::new());

    let mut user = common::register(&repo, "pg_user").await;
    for i in 0..5 {
        let events = user.update(common::display_name(&format!("n{}", i))).unwrap();
        repo.save(&mut user, events).await.unwrap();
    }

    let snapshot = store.get_latest("User", user.id()).await.unwrap().unwrap();
    assert_eq!(snapshot.aggregate_version, 5);

    let cold = AggregateRepository::<User>::with_store(store, AggregateCache::new());
    assert_eq!(cold.build(user.id()).await.unwrap(), user);
}

#[tokio::test]
#[ignore]
async fn test_versioned_update_rejects_stale_target() {
    let pool = common::setup_test_db().await;
    let profiles = PgUserProfileStore::new(pool);
    let now = Utc::now();
    let row = UserProfile {
        id: Uuid::new_v4(),
        username: "pg_profile".to_string(),
        email: "pg_profile@example.com".to_string(),
        display_name: None,
        status: UserStatus::Active,
        version: 1,
        deleted_at: None,
        created_at: now,
        updated_at: now,
    };
    profiles.insert(&row).await.unwrap();

    let patch = UserProfilePatch {
        display_name: Some("Renamed".to_string()),
        ..UserProfilePatch::default()
    };
    let updated = profiles.update_versioned(row.id, &patch, 2).await.unwrap();
    assert_eq!(updated.version, 2);

    let stale = profiles.update_versioned(row.id, &patch, 2).await;
    assert!(matches!(
        stale,
        Err(ProjectionError::VersionMismatch { target: 2, current: 2, .. })
    ));

    let duplicate = profiles.insert(&row).await;
    assert!(matches!(duplicate, Err(ProjectionError::AlreadyExists(_))));
}
