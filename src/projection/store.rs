//! Projection storage
//!
//! Storage seams for the user profile read model and for rebuild cursors,
//! with in-memory implementations. PostgreSQL implementations live in
//! `postgres.rs`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ProjectionError, UserProfile, UserProfilePatch};

/// Row storage for the user profile projection
#[async_trait]
pub trait UserProfileStore: Send + Sync {
    /// Insert a new row as given
    async fn insert(&self, profile: &UserProfile) -> Result<(), ProjectionError>;

    /// Lock the row, require `current + 1 == target_version`, merge the
    /// patch and set `version = target_version`, all in one transaction.
    async fn update_versioned(
        &self,
        id: Uuid,
        patch: &UserProfilePatch,
        target_version: i64,
    ) -> Result<UserProfile, ProjectionError>;

    /// Row by id, including soft-deleted rows
    async fn find(&self, id: Uuid) -> Result<Option<UserProfile>, ProjectionError>;

    /// Rows ordered by id
    async fn list(
        &self,
        offset: i64,
        limit: i64,
        include_deleted: bool,
    ) -> Result<Vec<UserProfile>, ProjectionError>;

    /// Delete every row, returning how many were removed
    async fn delete_all(&self) -> Result<u64, ProjectionError>;
}

/// Position of a projection in the global event sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionCursor {
    pub projection: String,
    pub last_sequence: i64,
    pub updated_at: DateTime<Utc>,
}

/// Durable rebuild cursors, one per projection
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn load(&self, projection: &str) -> Result<Option<ProjectionCursor>, ProjectionError>;

    async fn save(&self, projection: &str, last_sequence: i64) -> Result<(), ProjectionError>;

    async fn reset(&self, projection: &str) -> Result<(), ProjectionError>;
}

/// In-memory user profile rows
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserProfileStore {
    rows: Arc<RwLock<BTreeMap<Uuid, UserProfile>>>,
}

impl InMemoryUserProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserProfileStore for InMemoryUserProfileStore {
    async fn insert(&self, profile: &UserProfile) -> Result<(), ProjectionError> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&profile.id) {
            return Err(ProjectionError::AlreadyExists(profile.id));
        }
        rows.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn update_versioned(
        &self,
        id: Uuid,
        patch: &UserProfilePatch,
        target_version: i64,
    ) -> Result<UserProfile, ProjectionError> {
        // The write guard is the row lock
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(&id).ok_or(ProjectionError::NotFound(id))?;

        if row.version + 1 != target_version {
            return Err(ProjectionError::VersionMismatch {
                id,
                target: target_version,
                current: row.version,
            });
        }

        patch.apply_to(row, target_version);
        Ok(row.clone())
    }

    async fn find(&self, id: Uuid) -> Result<Option<UserProfile>, ProjectionError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn list(
        &self,
        offset: i64,
        limit: i64,
        include_deleted: bool,
    ) -> Result<Vec<UserProfile>, ProjectionError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|p| include_deleted || !p.is_deleted())
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn delete_all(&self) -> Result<u64, ProjectionError> {
        let mut rows = self.rows.write().await;
        let count = rows.len() as u64;
        rows.clear();
        Ok(count)
    }
}

/// In-memory cursors
#[derive(Debug, Clone, Default)]
pub struct InMemoryCursorStore {
    cursors: Arc<RwLock<HashMap<String, ProjectionCursor>>>,
}

impl InMemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CursorStore for InMemoryCursorStore {
    async fn load(&self, projection: &str) -> Result<Option<ProjectionCursor>, ProjectionError> {
        Ok(self.cursors.read().await.get(projection).cloned())
    }

    async fn save(&self, projection: &str, last_sequence: i64) -> Result<(), ProjectionError> {
        self.cursors.write().await.insert(
            projection.to_string(),
            ProjectionCursor {
                projection: projection.to_string(),
                last_sequence,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn reset(&self, projection: &str) -> Result<(), ProjectionError> {
        self.cursors.write().await.remove(projection);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::aggregate::UserStatus;

    fn profile(version: i64) -> UserProfile {
        let now = Utc::now();
        UserProfile {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            display_name: None,
            status: UserStatus::Active,
            version,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn rename(name: &str) -> UserProfilePatch {
        UserProfilePatch {
            display_name: Some(name.to_string()),
            ..UserProfilePatch::default()
        }
    }

    #[tokio::test]
    async fn test_update_requires_next_version() {
        let store = InMemoryUserProfileStore::new();
        let row = profile(2);
        store.insert(&row).await.unwrap();

        let result = store.update_versioned(row.id, &rename("x"), 2).await;
        assert!(matches!(
            result,
            Err(ProjectionError::VersionMismatch { target: 2, current: 2, .. })
        ));

        let updated = store.update_versioned(row.id, &rename("y"), 3).await.unwrap();
        assert_eq!(updated.version, 3);
        assert_eq!(updated.display_name.as_deref(), Some("y"));
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let store = InMemoryUserProfileStore::new();
        let result = store.update_versioned(Uuid::new_v4(), &rename("x"), 2).await;
        assert!(matches!(result, Err(ProjectionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_insert_twice_fails() {
        let store = InMemoryUserProfileStore::new();
        let row = profile(1);
        assert_ok!(store.insert(&row).await);

        let err = assert_err!(store.insert(&row).await);
        assert!(matches!(err, ProjectionError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_list_hides_soft_deleted_rows() {
        let store = InMemoryUserProfileStore::new();
        let visible = profile(1);
        let mut hidden = profile(2);
        hidden.deleted_at = Some(Utc::now());
        store.insert(&visible).await.unwrap();
        store.insert(&hidden).await.unwrap();

        assert_eq!(store.list(0, 10, false).await.unwrap(), vec![visible]);
        assert_eq!(store.list(0, 10, true).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cursor_save_load_reset() {
        let cursors = InMemoryCursorStore::new();
        assert!(cursors.load("user_profiles").await.unwrap().is_none());

        cursors.save("user_profiles", 42).await.unwrap();
        let cursor = cursors.load("user_profiles").await.unwrap().unwrap();
        assert_eq!(cursor.last_sequence, 42);

        cursors.reset("user_profiles").await.unwrap();
        assert!(cursors.load("user_profiles").await.unwrap().is_none());
    }
}
