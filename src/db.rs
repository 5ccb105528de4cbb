//! Database module
//!
//! Connectivity check, schema verification and idempotent schema bootstrap.

use sqlx::{Executor, PgPool};

/// Full schema; every statement is `IF NOT EXISTS`
pub const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

/// Tables the stores and the projection need
pub const REQUIRED_TABLES: &[&str] = &["events", "snapshots", "projection_cursors", "user_profiles"];

/// Verify database connectivity
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = current_schema() AND table_name = $1
            )
            "#,
        )
        .bind(*table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::warn!(table = %table, "Required table does not exist");
            return Ok(false);
        }
    }

    Ok(true)
}

/// Create any missing tables and indexes
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::Error> {
    pool.execute(SCHEMA).await?;
    tracing::info!("Database schema applied");
    Ok(())
}
