//! Database initialization
//!
//! Startup sequence:
//! 1. Open (or create) the database file
//! 2. CREATE TABLE IF NOT EXISTS for every table
//! 3. Column auto-sync (`table_schemas`)
//! 4. Versioned migrations
//! 5. Default settings
//! 6. Seed the unknown-filer identity

use crate::company::{UNKNOWN_FILER_ID, UNKNOWN_FILER_NAME};
use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Settings key recording the build that created the database
pub const CREATED_WITH_VERSION_KEY: &str = "database_created_with";

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Classification is single-writer; a small pool is enough for the
    // writer plus concurrent readers.
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets the reader service query while a classification run writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    prepare_schema(&pool).await?;

    Ok(pool)
}

/// Initialize a private in-memory database (tests, dry runs)
///
/// A single connection is used because every `sqlite::memory:` connection
/// is a separate database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    prepare_schema(&pool).await?;

    Ok(pool)
}

/// Create tables, sync columns, run migrations and seed required rows
/// (idempotent)
pub async fn prepare_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_filings_table(pool).await?;
    create_companies_table(pool).await?;
    create_company_dbas_table(pool).await?;
    create_company_aliases_table(pool).await?;
    create_observed_key_tables(pool).await?;

    crate::db::table_schemas::sync_all_table_schemas(pool).await?;

    crate::db::migrations::run_migrations(pool).await?;

    init_default_settings(pool).await?;

    seed_unknown_filer(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Key-value pairs; holds the classifier high-water mark.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the filings table
///
/// `approval_date` is stored as ISO `YYYY-MM-DD` so SQL ordering is
/// chronological. `signal` and `refile_count` are the only columns the
/// pipeline writes after ingestion.
pub async fn create_filings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS filings (
            ttb_id TEXT PRIMARY KEY,
            filer_name TEXT NOT NULL DEFAULT '',
            brand_name TEXT NOT NULL DEFAULT '',
            variant_name TEXT NOT NULL DEFAULT '',
            category_code TEXT NOT NULL DEFAULT '',
            approval_date TEXT NOT NULL,
            status TEXT NOT NULL,
            company_id TEXT REFERENCES companies(company_id),
            signal TEXT CHECK (signal IN ('NEW_COMPANY', 'NEW_BRAND', 'NEW_PRODUCT', 'RESUBMISSION')),
            refile_count INTEGER,
            classified_at TIMESTAMP,
            ingested_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_companies_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS companies (
            company_id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            normalized_name TEXT NOT NULL UNIQUE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_company_dbas_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS company_dbas (
            company_id TEXT NOT NULL REFERENCES companies(company_id),
            dba_name TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (company_id, dba_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_company_aliases_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS company_aliases (
            raw_name TEXT PRIMARY KEY,
            normalized_name TEXT NOT NULL,
            company_id TEXT NOT NULL REFERENCES companies(company_id),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_observed_key_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS observed_companies (
            company_id TEXT PRIMARY KEY REFERENCES companies(company_id),
            first_seen TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS observed_brands (
            company_id TEXT NOT NULL REFERENCES companies(company_id),
            brand TEXT NOT NULL,
            first_seen TEXT NOT NULL,
            PRIMARY KEY (company_id, brand)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS observed_products (
            company_id TEXT NOT NULL REFERENCES companies(company_id),
            brand TEXT NOT NULL,
            variant TEXT NOT NULL,
            first_seen TEXT NOT NULL,
            PRIMARY KEY (company_id, brand, variant)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Settings every database carries
///
/// The classifier high-water mark is deliberately absent: no mark means
/// nothing has been classified yet.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, CREATED_WITH_VERSION_KEY, env!("CARGO_PKG_VERSION")).await?;
    Ok(())
}

/// Insert a setting when missing or NULL; existing values are kept
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO settings (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value WHERE settings.value IS NULL
        "#,
    )
    .bind(key)
    .bind(default_value)
    .execute(pool)
    .await?
    .rows_affected();

    if inserted > 0 {
        info!("Initialized setting '{}' with default value: {}", key, default_value);
    }
    Ok(())
}

async fn seed_unknown_filer(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO companies (company_id, display_name, normalized_name)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(UNKNOWN_FILER_ID.to_string())
    .bind(UNKNOWN_FILER_NAME)
    .bind("")
    .execute(pool)
    .await?;

    Ok(())
}
