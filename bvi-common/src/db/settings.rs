//! Key-value settings access

use crate::Result;
use sqlx::{Sqlite, SqlitePool, Transaction};

/// Read a setting value
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    Ok(value.flatten())
}

/// Write a setting value
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(UPSERT_SETTING)
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;

    Ok(())
}

/// Write a setting value inside an open transaction
pub async fn set_setting_tx(
    tx: &mut Transaction<'_, Sqlite>,
    key: &str,
    value: &str,
) -> Result<()> {
    sqlx::query(UPSERT_SETTING)
        .bind(key)
        .bind(value)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Remove a setting
pub async fn delete_setting_tx(tx: &mut Transaction<'_, Sqlite>, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(key)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

const UPSERT_SETTING: &str = r#"
    INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
    ON CONFLICT(key) DO UPDATE SET
        value = excluded.value,
        updated_at = CURRENT_TIMESTAMP
"#;
