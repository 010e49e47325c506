//! Database access layer for bvi-reader
//!
//! All connections are read-only.

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

mod queries;
pub use queries::*;

/// Open the database with `mode=ro` so no statement can write
pub async fn connect_readonly(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        anyhow::bail!(
            "Database not found: {}\nRun bvi-signals first to create it.",
            db_path.display()
        );
    }

    // No immutable=1: the classifier may be writing through WAL while we read
    let db_url = format!("sqlite://{}?mode=ro", db_path.display());

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect(&db_url)
        .await
        .context("Failed to connect to database in read-only mode")?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_readonly_connection_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("bvi.db");
        let writer = bvi_common::db::init_database(&db_path).await.unwrap();
        writer.close().await;

        let pool = connect_readonly(&db_path).await.unwrap();
        let result = sqlx::query("CREATE TABLE _write_test (id INTEGER)")
            .execute(&pool)
            .await;
        assert!(result.is_err(), "write succeeded on read-only connection");
    }

    #[tokio::test]
    async fn test_missing_database_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(connect_readonly(&dir.path().join("missing.db")).await.is_err());
    }
}
