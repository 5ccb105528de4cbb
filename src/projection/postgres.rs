//! PostgreSQL projection storage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::aggregate::UserStatus;

use super::store::{CursorStore, ProjectionCursor, UserProfileStore};
use super::{ProjectionError, UserProfile, UserProfilePatch};

#[derive(Debug, sqlx::FromRow)]
struct UserProfileRow {
    id: Uuid,
    username: String,
    email: String,
    display_name: Option<String>,
    status: String,
    version: i64,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserProfileRow> for UserProfile {
    type Error = ProjectionError;

    fn try_from(row: UserProfileRow) -> Result<Self, Self::Error> {
        let status = UserStatus::parse(&row.status).ok_or_else(|| {
            ProjectionError::Database(sqlx::Error::Decode(
                format!("Unknown user status: {}", row.status).into(),
            ))
        })?;

        Ok(Self {
            id: row.id,
            username: row.username,
            email: row.email,
            display_name: row.display_name,
            status,
            version: row.version,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// `user_profiles` table
#[derive(Debug, Clone)]
pub struct PgUserProfileStore {
    pool: PgPool,
}

impl PgUserProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserProfileStore for PgUserProfileStore {
    async fn insert(&self, profile: &UserProfile) -> Result<(), ProjectionError> {
        sqlx::query(
            r#"
            INSERT INTO user_profiles (
                id, username, email, display_name, status,
                version, deleted_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(profile.id)
        .bind(&profile.username)
        .bind(&profile.email)
        .bind(&profile.display_name)
        .bind(profile.status.as_str())
        .bind(profile.version)
        .bind(profile.deleted_at)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                ProjectionError::AlreadyExists(profile.id)
            }
            other => ProjectionError::Database(other),
        })?;

        tracing::debug!(projection = "user_profiles", id = %profile.id, "Projection row inserted");
        Ok(())
    }

    async fn update_versioned(
        &self,
        id: Uuid,
        patch: &UserProfilePatch,
        target_version: i64,
    ) -> Result<UserProfile, ProjectionError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<UserProfileRow> = sqlx::query_as(
            r#"
            SELECT id, username, email, display_name, status,
                   version, deleted_at, created_at, updated_at
            FROM user_profiles
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        // Dropping `tx` on the error paths rolls back and releases the lock
        let mut profile = UserProfile::try_from(row.ok_or(ProjectionError::NotFound(id))?)?;

        if profile.version + 1 != target_version {
            return Err(ProjectionError::VersionMismatch {
                id,
                target: target_version,
                current: profile.version,
            });
        }

        patch.apply_to(&mut profile, target_version);

        sqlx::query(
            r#"
            UPDATE user_profiles
            SET email = $2,
                display_name = $3,
                status = $4,
                version = $5,
                deleted_at = $6,
                updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&profile.email)
        .bind(&profile.display_name)
        .bind(profile.status.as_str())
        .bind(profile.version)
        .bind(profile.deleted_at)
        .bind(profile.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            projection = "user_profiles",
            id = %id,
            version = target_version,
            "Projection row updated"
        );

        Ok(profile)
    }

    async fn find(&self, id: Uuid) -> Result<Option<UserProfile>, ProjectionError> {
        let row: Option<UserProfileRow> = sqlx::query_as(
            r#"
            SELECT id, username, email, display_name, status,
                   version, deleted_at, created_at, updated_at
            FROM user_profiles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserProfile::try_from).transpose()
    }

    async fn list(
        &self,
        offset: i64,
        limit: i64,
        include_deleted: bool,
    ) -> Result<Vec<UserProfile>, ProjectionError> {
        let rows: Vec<UserProfileRow> = sqlx::query_as(
            r#"
            SELECT id, username, email, display_name, status,
                   version, deleted_at, created_at, updated_at
            FROM user_profiles
            WHERE $1 OR deleted_at IS NULL
            ORDER BY id
            OFFSET $2
            LIMIT $3
            "#,
        )
        .bind(include_deleted)
        .bind(offset.max(0))
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UserProfile::try_from).collect()
    }

    async fn delete_all(&self) -> Result<u64, ProjectionError> {
        let deleted = sqlx::query("DELETE FROM user_profiles")
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(projection = "user_profiles", deleted, "Projection table cleared");
        Ok(deleted)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CursorRow {
    projection: String,
    last_sequence: i64,
    updated_at: DateTime<Utc>,
}

/// `projection_cursors` table
#[derive(Debug, Clone)]
pub struct PgCursorStore {
    pool: PgPool,
}

impl PgCursorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CursorStore for PgCursorStore {
    async fn load(&self, projection: &str) -> Result<Option<ProjectionCursor>, ProjectionError> {
        let row: Option<CursorRow> = sqlx::query_as(
            r#"
            SELECT projection, last_sequence, updated_at
            FROM projection_cursors
            WHERE projection = $1
            "#,
        )
        .bind(projection)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| ProjectionCursor {
            projection: r.projection,
            last_sequence: r.last_sequence,
            updated_at: r.updated_at,
        }))
    }

    async fn save(&self, projection: &str, last_sequence: i64) -> Result<(), ProjectionError> {
        sqlx::query(
            r#"
            INSERT INTO projection_cursors (projection, last_sequence, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (projection) DO UPDATE
            SET last_sequence = EXCLUDED.last_sequence,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(projection)
        .bind(last_sequence)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn reset(&self, projection: &str) -> Result<(), ProjectionError> {
        sqlx::query("DELETE FROM projection_cursors WHERE projection = $1")
            .bind(projection)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
