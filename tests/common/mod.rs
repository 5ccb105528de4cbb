//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use eventkeep::aggregate::{AggregateCache, AggregateRepository, User};
use eventkeep::domain::UserChanges;
use eventkeep::event_store::InMemoryEventStore;
use eventkeep::projection::{
    InMemoryCursorStore, InMemoryUserProfileStore, UserProfile, UserProfileStore, UserProjection,
};

/// Connect to `DATABASE_URL` and make sure the schema exists
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    eventkeep::db::migrate(&pool)
        .await
        .expect("Failed to apply schema");

    pool
}

/// In-memory wiring of every component
pub struct MemoryStack {
    pub events: InMemoryEventStore,
    pub profiles: InMemoryUserProfileStore,
    pub cursors: InMemoryCursorStore,
    pub repository: AggregateRepository<User>,
    pub projection: UserProjection,
}

impl MemoryStack {
    pub fn new() -> Self {
        let events = InMemoryEventStore::new();
        let profiles = InMemoryUserProfileStore::new();
        let cursors = InMemoryCursorStore::new();
        let repository = AggregateRepository::with_store(events.clone(), AggregateCache::new());
        let projection = UserProjection::new(
            Arc::new(profiles.clone()),
            Arc::new(events.clone()),
            Arc::new(events.clone()),
            Arc::new(cursors.clone()),
        );

        Self {
            events,
            profiles,
            cursors,
            repository,
            projection,
        }
    }

    /// Every projection row, deleted ones included
    pub async fn profiles_snapshot(&self) -> Vec<UserProfile> {
        self.profiles.list(0, 1000, true).await.unwrap()
    }

    /// Fresh repository over the same store, with an empty cache
    pub fn cold_repository(&self) -> AggregateRepository<User> {
        AggregateRepository::with_store(self.events.clone(), AggregateCache::new())
    }
}

/// Register a user through the repository
pub async fn register(repo: &AggregateRepository<User>, username: &str) -> User {
    let mut user = User::default();
    let events = user
        .register(
            Uuid::new_v4(),
            username.to_string(),
            format!("{}@example.com", username),
            None,
        )
        .unwrap();
    repo.save(&mut user, events).await.unwrap();
    user
}

pub fn display_name(name: &str) -> UserChanges {
    UserChanges {
        display_name: Some(name.to_string()),
        email: None,
    }
}
