//! Filing rows
//!
//! Rows are inserted once and never overwritten; classification only ever
//! fills `company_id`, `signal`, `refile_count` and `classified_at`.

use bvi_common::db::{get_setting, CREATED_WITH_VERSION_KEY};
use bvi_common::{CompanyId, FilingId, FilingRecord, FilingStatus, Result, Signal};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use tracing::info;

/// Outcome of storing an ingested batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InsertSummary {
    pub inserted: usize,
    /// Already stored; left untouched
    pub existing: usize,
}

/// Store new filings. Filings already present are skipped.
pub async fn insert_filings(pool: &SqlitePool, records: &[FilingRecord]) -> Result<InsertSummary> {
    let mut tx = pool.begin().await?;
    let mut summary = InsertSummary::default();

    for record in records {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO filings (
                ttb_id, filer_name, brand_name, variant_name, category_code,
                approval_date, status
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.ttb_id.as_str())
        .bind(&record.filer_name)
        .bind(&record.brand_name)
        .bind(&record.variant_name)
        .bind(&record.category_code)
        .bind(record.approval_date.to_string())
        .bind(record.status.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            summary.existing += 1;
        } else {
            summary.inserted += 1;
        }
    }

    tx.commit().await?;

    info!(
        "Stored {} new filings ({} already present)",
        summary.inserted, summary.existing
    );

    Ok(summary)
}

const FILING_COLUMNS: &str = r#"
    SELECT ttb_id, filer_name, brand_name, variant_name, category_code,
           approval_date, status
    FROM filings
"#;

fn record_from_row(row: &SqliteRow) -> Result<FilingRecord> {
    let approval_date: NaiveDate = row.try_get("approval_date")?;
    let status: String = row.get("status");

    Ok(FilingRecord {
        ttb_id: FilingId::new(row.get::<String, _>("ttb_id")),
        filer_name: row.get("filer_name"),
        brand_name: row.get("brand_name"),
        variant_name: row.get("variant_name"),
        category_code: row.get("category_code"),
        approval_date,
        status: FilingStatus::parse(&status),
    })
}

/// Filings not yet classified, in no particular order
pub async fn load_unclassified(pool: &SqlitePool) -> Result<Vec<FilingRecord>> {
    let rows = sqlx::query(&format!("{} WHERE signal IS NULL", FILING_COLUMNS))
        .fetch_all(pool)
        .await?;
    rows.iter().map(record_from_row).collect()
}

/// Every stored filing, in no particular order
pub async fn load_all_filings(pool: &SqlitePool) -> Result<Vec<FilingRecord>> {
    let rows = sqlx::query(FILING_COLUMNS).fetch_all(pool).await?;
    rows.iter().map(record_from_row).collect()
}

/// Every distinct raw filer name with the position it was first seen at
pub async fn load_first_seen_filer_names(pool: &SqlitePool) -> Result<Vec<FilingRecord>> {
    let mut records = load_all_filings(pool).await?;
    crate::classifier::sort_chronologically(&mut records);

    let mut seen = std::collections::HashSet::new();
    records.retain(|r| seen.insert(r.filer_name.clone()));
    Ok(records)
}

/// Set an operator-chosen display name. Returns false if no such company.
pub async fn rename_company(pool: &SqlitePool, company_id: CompanyId, display_name: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE companies SET display_name = ? WHERE company_id = ?")
        .bind(display_name)
        .bind(company_id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Counts for the `stats` command
#[derive(Debug, Default, Clone, Serialize)]
pub struct FilingStats {
    pub filings: i64,
    pub unclassified: i64,
    pub by_signal: BTreeMap<String, i64>,
    pub companies: i64,
    pub aliases: i64,
    /// Build that created the database
    pub database_created_with: Option<String>,
}

pub async fn load_stats(pool: &SqlitePool) -> Result<FilingStats> {
    let filings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM filings")
        .fetch_one(pool)
        .await?;
    let unclassified: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM filings WHERE signal IS NULL")
        .fetch_one(pool)
        .await?;
    let companies: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM companies")
        .fetch_one(pool)
        .await?;
    let aliases: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM company_aliases")
        .fetch_one(pool)
        .await?;

    let mut by_signal: BTreeMap<String, i64> = Signal::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    let rows = sqlx::query(
        "SELECT signal, COUNT(*) AS n FROM filings WHERE signal IS NOT NULL GROUP BY signal",
    )
    .fetch_all(pool)
    .await?;
    for row in rows {
        by_signal.insert(row.get("signal"), row.get("n"));
    }

    Ok(FilingStats {
        filings,
        unclassified,
        by_signal,
        companies,
        aliases,
        database_created_with: get_setting(pool, CREATED_WITH_VERSION_KEY).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bvi_common::db::init_memory_database;

    fn record(ttb_id: &str, filer: &str, date: (i32, u32, u32)) -> FilingRecord {
        FilingRecord {
            ttb_id: FilingId::new(ttb_id),
            filer_name: filer.to_string(),
            brand_name: "Gin".to_string(),
            variant_name: String::new(),
            category_code: "140".to_string(),
            approval_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            status: FilingStatus::Surrendered,
        }
    }

    #[tokio::test]
    async fn test_insert_is_write_once() {
        let pool = init_memory_database().await.unwrap();
        let first = record("1", "Acme Spirits LLC", (2024, 1, 1));

        let summary = insert_filings(&pool, &[first.clone()]).await.unwrap();
        assert_eq!(summary, InsertSummary { inserted: 1, existing: 0 });

        let mut changed = first.clone();
        changed.filer_name = "Someone Else".to_string();
        let summary = insert_filings(&pool, &[changed]).await.unwrap();
        assert_eq!(summary, InsertSummary { inserted: 0, existing: 1 });

        let stored = load_all_filings(&pool).await.unwrap();
        assert_eq!(stored, vec![first]);
    }

    #[tokio::test]
    async fn test_first_seen_filer_names() {
        let pool = init_memory_database().await.unwrap();
        insert_filings(
            &pool,
            &[
                record("3", "Beta Wines Inc", (2024, 2, 1)),
                record("1", "Acme Spirits LLC", (2024, 1, 1)),
                record("2", "Beta Wines Inc", (2024, 1, 15)),
            ],
        )
        .await
        .unwrap();

        let names: Vec<(String, String)> = load_first_seen_filer_names(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.ttb_id.to_string(), r.filer_name))
            .collect();
        assert_eq!(
            names,
            vec![
                ("1".to_string(), "Acme Spirits LLC".to_string()),
                ("2".to_string(), "Beta Wines Inc".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_rename_company() {
        let pool = init_memory_database().await.unwrap();
        assert!(rename_company(&pool, bvi_common::UNKNOWN_FILER_ID, "Unattributed")
            .await
            .unwrap());
        assert!(!rename_company(&pool, CompanyId::for_normalized_name("NOPE"), "x")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_stats_on_empty_database() {
        let pool = init_memory_database().await.unwrap();
        let stats = load_stats(&pool).await.unwrap();
        assert_eq!(stats.filings, 0);
        assert_eq!(stats.companies, 1);
        assert_eq!(stats.by_signal.len(), 4);
        assert!(stats.by_signal.values().all(|&n| n == 0));
        assert!(stats.database_created_with.is_some());
    }
}
