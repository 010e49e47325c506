//! Classifier state persistence
//!
//! The store is loaded once per run. Each record's journaled changes are then
//! written in one transaction that commits before the next record is
//! classified, so an interrupted run leaves a consistent prefix behind.

use bvi_common::db::{delete_setting_tx, get_setting, set_setting_tx};
use bvi_common::{
    AliasEntry, CompanyId, CompanyIdentity, Error, FilingId, ReplayPosition, Result, Signal,
    UNKNOWN_FILER_ID,
};
use chrono::NaiveDate;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use tracing::debug;

use crate::classifier::ClassifiedFiling;
use crate::normalizer::normalize_key;
use crate::refile::{RefileCounter, RefileUpdate};
use crate::store::{MemoryStore, ProductKey, SignalStore, StoreChange};

pub const HWM_DATE_KEY: &str = "classifier_hwm_date";
pub const HWM_TTB_ID_KEY: &str = "classifier_hwm_ttb_id";

fn company_id(raw: &str) -> Result<CompanyId> {
    CompanyId::from_str(raw)
}

/// Load aliases, companies, observed keys and classifications
pub async fn load_store(pool: &SqlitePool) -> Result<MemoryStore> {
    let mut store = MemoryStore::new();

    let rows = sqlx::query(
        "SELECT company_id, display_name, normalized_name FROM companies ORDER BY rowid",
    )
    .fetch_all(pool)
    .await?;
    for row in rows {
        store.restore_company(CompanyIdentity {
            id: company_id(&row.get::<String, _>("company_id"))?,
            display_name: row.get("display_name"),
            normalized_name: row.get("normalized_name"),
            dba_names: Vec::new(),
        });
    }

    let rows = sqlx::query("SELECT company_id, dba_name FROM company_dbas ORDER BY rowid")
        .fetch_all(pool)
        .await?;
    for row in rows {
        store.restore_dba(company_id(&row.get::<String, _>("company_id"))?, &row.get::<String, _>("dba_name"));
    }

    let rows = sqlx::query(
        "SELECT raw_name, normalized_name, company_id FROM company_aliases ORDER BY rowid",
    )
    .fetch_all(pool)
    .await?;
    for row in rows {
        store.restore_alias(AliasEntry {
            raw_name: row.get("raw_name"),
            normalized_name: row.get("normalized_name"),
            company_id: company_id(&row.get::<String, _>("company_id"))?,
        });
    }

    let rows = sqlx::query("SELECT company_id, first_seen FROM observed_companies")
        .fetch_all(pool)
        .await?;
    for row in rows {
        let first_seen: NaiveDate = row.try_get("first_seen")?;
        store.restore_observed_company(company_id(&row.get::<String, _>("company_id"))?, first_seen);
    }

    let rows = sqlx::query("SELECT company_id, brand, first_seen FROM observed_brands")
        .fetch_all(pool)
        .await?;
    for row in rows {
        let first_seen: NaiveDate = row.try_get("first_seen")?;
        let brand: String = row.get("brand");
        store.restore_observed_brand(company_id(&row.get::<String, _>("company_id"))?, &brand, first_seen);
    }

    let rows = sqlx::query("SELECT company_id, brand, variant, first_seen FROM observed_products")
        .fetch_all(pool)
        .await?;
    for row in rows {
        let first_seen: NaiveDate = row.try_get("first_seen")?;
        let key = ProductKey::new(
            company_id(&row.get::<String, _>("company_id"))?,
            row.get::<String, _>("brand"),
            row.get::<String, _>("variant"),
        );
        store.restore_observed_product(key, first_seen);
    }

    for filing in load_classified(pool).await? {
        store.restore_classification(filing);
    }

    if let Some(position) = load_high_water_mark(pool).await? {
        store.restore_high_water(position);
    }

    debug!(
        companies = store.companies().count(),
        aliases = store.alias_count(),
        classified = store.classified_count(),
        observed_companies = store.observed_keys().company_count(),
        observed_brands = store.observed_keys().brand_count(),
        observed_products = store.observed_keys().product_count(),
        "Loaded classifier state"
    );

    Ok(store)
}

/// Classified filings with their keys rebuilt from the stored names
pub async fn load_classified(pool: &SqlitePool) -> Result<Vec<ClassifiedFiling>> {
    let rows = sqlx::query(
        r#"
        SELECT ttb_id, approval_date, company_id, brand_name, variant_name, signal
        FROM filings
        WHERE signal IS NOT NULL
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<ClassifiedFiling> {
            let raw_company: Option<String> = row.get("company_id");
            let raw_company = raw_company.ok_or_else(|| {
                Error::Internal(format!(
                    "Filing {} has a signal but no company",
                    row.get::<String, _>("ttb_id")
                ))
            })?;
            let signal: String = row.get("signal");
            Ok(ClassifiedFiling {
                position: ReplayPosition {
                    approval_date: row.try_get("approval_date")?,
                    ttb_id: FilingId::new(row.get::<String, _>("ttb_id")),
                },
                key: ProductKey::new(
                    company_id(&raw_company)?,
                    normalize_key(&row.get::<String, _>("brand_name")),
                    normalize_key(&row.get::<String, _>("variant_name")),
                ),
                signal: Signal::from_str(&signal)?,
            })
        })
        .collect()
}

pub async fn load_high_water_mark(pool: &SqlitePool) -> Result<Option<ReplayPosition>> {
    let date = get_setting(pool, HWM_DATE_KEY).await?;
    let ttb_id = get_setting(pool, HWM_TTB_ID_KEY).await?;

    match (date, ttb_id) {
        (Some(date), Some(ttb_id)) => {
            let approval_date = NaiveDate::from_str(&date).map_err(|e| {
                Error::Internal(format!("Corrupt high-water date '{}': {}", date, e))
            })?;
            Ok(Some(ReplayPosition {
                approval_date,
                ttb_id: FilingId::new(ttb_id),
            }))
        }
        _ => Ok(None),
    }
}

/// Refile groups for every first-occurrence filing
pub async fn load_refile_counter(pool: &SqlitePool) -> Result<RefileCounter> {
    let refile_counts: std::collections::HashMap<String, i64> = sqlx::query(
        "SELECT ttb_id, COALESCE(refile_count, 0) AS refile_count FROM filings WHERE signal IS NOT NULL",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| (row.get("ttb_id"), row.get("refile_count")))
    .collect();

    let mut counter = RefileCounter::new();
    for filing in load_classified(pool).await? {
        if !filing.signal.is_first_occurrence() {
            continue;
        }
        let refiles = refile_counts
            .get(filing.ttb_id().as_str())
            .copied()
            .unwrap_or(0);
        let refiles = u32::try_from(refiles)
            .map_err(|_| Error::Internal(format!("Negative refile count on {}", filing.ttb_id())))?;
        counter.restore(filing.key.clone(), filing.ttb_id().clone(), refiles);
    }

    Ok(counter)
}

/// Write one record's changes and refile update in a single transaction
pub async fn persist_step(
    pool: &SqlitePool,
    changes: &[StoreChange],
    refile: Option<&RefileUpdate>,
) -> Result<()> {
    let mut tx = pool.begin().await?;
    apply_changes(&mut tx, changes).await?;
    if let Some(update) = refile {
        apply_refile(&mut tx, update).await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn apply_changes(tx: &mut Transaction<'_, Sqlite>, changes: &[StoreChange]) -> Result<()> {
    for change in changes {
        match change {
            StoreChange::CompanyCreated(identity) => {
                sqlx::query(
                    "INSERT INTO companies (company_id, display_name, normalized_name) VALUES (?, ?, ?)",
                )
                .bind(identity.id.to_string())
                .bind(&identity.display_name)
                .bind(&identity.normalized_name)
                .execute(&mut **tx)
                .await?;
            }
            StoreChange::DbaAdded { company_id, dba_name } => {
                sqlx::query("INSERT OR IGNORE INTO company_dbas (company_id, dba_name) VALUES (?, ?)")
                    .bind(company_id.to_string())
                    .bind(dba_name)
                    .execute(&mut **tx)
                    .await?;
            }
            StoreChange::AliasBound(entry) => {
                sqlx::query(
                    "INSERT INTO company_aliases (raw_name, normalized_name, company_id) VALUES (?, ?, ?)",
                )
                .bind(&entry.raw_name)
                .bind(&entry.normalized_name)
                .bind(entry.company_id.to_string())
                .execute(&mut **tx)
                .await?;
            }
            StoreChange::CompanyObserved { company_id, first_seen } => {
                sqlx::query("INSERT OR IGNORE INTO observed_companies (company_id, first_seen) VALUES (?, ?)")
                    .bind(company_id.to_string())
                    .bind(first_seen.to_string())
                    .execute(&mut **tx)
                    .await?;
            }
            StoreChange::BrandObserved { company_id, brand, first_seen } => {
                sqlx::query(
                    "INSERT OR IGNORE INTO observed_brands (company_id, brand, first_seen) VALUES (?, ?, ?)",
                )
                .bind(company_id.to_string())
                .bind(brand)
                .bind(first_seen.to_string())
                .execute(&mut **tx)
                .await?;
            }
            StoreChange::ProductObserved { key, first_seen } => {
                sqlx::query(
                    r#"
                    INSERT OR IGNORE INTO observed_products (company_id, brand, variant, first_seen)
                    VALUES (?, ?, ?, ?)
                    "#,
                )
                .bind(key.company_id.to_string())
                .bind(&key.brand)
                .bind(&key.variant)
                .bind(first_seen.to_string())
                .execute(&mut **tx)
                .await?;
            }
            StoreChange::Classified(filing) => {
                let result = sqlx::query(
                    r#"
                    UPDATE filings
                    SET company_id = ?, signal = ?, classified_at = CURRENT_TIMESTAMP
                    WHERE ttb_id = ? AND signal IS NULL
                    "#,
                )
                .bind(filing.company_id().to_string())
                .bind(filing.signal.as_str())
                .bind(filing.ttb_id().as_str())
                .execute(&mut **tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(Error::NotFound(format!(
                        "No unclassified filing {} to record",
                        filing.ttb_id()
                    )));
                }

                set_setting_tx(tx, HWM_DATE_KEY, &filing.position.approval_date.to_string()).await?;
                set_setting_tx(tx, HWM_TTB_ID_KEY, filing.ttb_id().as_str()).await?;
            }
        }
    }
    Ok(())
}

async fn apply_refile(tx: &mut Transaction<'_, Sqlite>, update: &RefileUpdate) -> Result<()> {
    sqlx::query("UPDATE filings SET refile_count = ? WHERE ttb_id = ?")
        .bind(i64::from(update.refile_count))
        .bind(update.ttb_id.as_str())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Clear signals, refile counts, observed keys and the high-water mark.
/// Companies and aliases are kept.
pub async fn reset_classification_tx(tx: &mut Transaction<'_, Sqlite>) -> Result<()> {
    sqlx::query(
        "UPDATE filings SET company_id = NULL, signal = NULL, refile_count = NULL, classified_at = NULL",
    )
    .execute(&mut **tx)
    .await?;
    for table in ["observed_products", "observed_brands", "observed_companies"] {
        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&mut **tx)
            .await?;
    }
    delete_setting_tx(tx, HWM_DATE_KEY).await?;
    delete_setting_tx(tx, HWM_TTB_ID_KEY).await?;
    Ok(())
}

pub async fn reset_classification(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;
    reset_classification_tx(&mut tx).await?;
    tx.commit().await?;
    Ok(())
}

/// Clear classification and every company identity except the unknown filer
pub async fn reset_identities_tx(tx: &mut Transaction<'_, Sqlite>) -> Result<()> {
    reset_classification_tx(tx).await?;
    sqlx::query("DELETE FROM company_aliases")
        .execute(&mut **tx)
        .await?;
    sqlx::query("DELETE FROM company_dbas")
        .execute(&mut **tx)
        .await?;
    sqlx::query("DELETE FROM companies WHERE company_id != ?")
        .bind(UNKNOWN_FILER_ID.to_string())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::SignalClassifier;
    use crate::db::filings::insert_filings;
    use crate::normalizer::IdentityNormalizer;
    use crate::similarity::TokenSort;
    use bvi_common::db::init_memory_database;
    use bvi_common::{FilingRecord, FilingStatus};

    fn record(ttb_id: &str, filer: &str, brand: &str, day: u32) -> FilingRecord {
        FilingRecord {
            ttb_id: FilingId::new(ttb_id),
            filer_name: filer.to_string(),
            brand_name: brand.to_string(),
            variant_name: String::new(),
            category_code: "140".to_string(),
            approval_date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            status: FilingStatus::Approved,
        }
    }

    #[tokio::test]
    async fn test_persisted_state_reloads_identically() {
        let pool = init_memory_database().await.unwrap();
        let records = vec![
            record("1", "Widget Co, Brand Holdings LLC", "Widget", 1),
            record("2", "Brand Holdings L.L.C.", "Widget", 2),
            record("3", "", "Mystery", 3),
        ];
        insert_filings(&pool, &records).await.unwrap();

        let classifier = SignalClassifier::new(IdentityNormalizer::new(Box::new(TokenSort), 0.92, 5));
        let mut store = load_store(&pool).await.unwrap();
        for record in &records {
            classifier.classify(record, &mut store).unwrap();
            persist_step(&pool, &store.take_changes(), None).await.unwrap();
        }

        let reloaded = load_store(&pool).await.unwrap();
        assert_eq!(reloaded.observed_keys(), store.observed_keys());
        assert_eq!(reloaded.high_water_mark(), store.high_water_mark());
        assert_eq!(reloaded.alias_count(), store.alias_count());
        assert_eq!(
            reloaded.companies().cloned().collect::<Vec<_>>(),
            store.companies().cloned().collect::<Vec<_>>()
        );
        for record in &records {
            assert_eq!(reloaded.classified(&record.ttb_id), store.classified(&record.ttb_id));
        }
    }

    #[tokio::test]
    async fn test_classified_without_filing_row_fails() {
        let pool = init_memory_database().await.unwrap();
        let classifier = SignalClassifier::new(IdentityNormalizer::new(Box::new(TokenSort), 0.92, 5));
        let mut store = load_store(&pool).await.unwrap();
        classifier
            .classify(&record("1", "Acme Spirits LLC", "Gin", 1), &mut store)
            .unwrap();

        let err = persist_step(&pool, &store.take_changes(), None).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        // Rolled back: nothing from the failed step is visible
        let companies: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM companies")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(companies, 1);
    }

    #[tokio::test]
    async fn test_reset_identities_keeps_unknown_filer() {
        let pool = init_memory_database().await.unwrap();
        let records = vec![record("1", "Acme Spirits LLC", "Gin", 1)];
        insert_filings(&pool, &records).await.unwrap();
        let classifier = SignalClassifier::new(IdentityNormalizer::new(Box::new(TokenSort), 0.92, 5));
        let mut store = load_store(&pool).await.unwrap();
        classifier.classify(&records[0], &mut store).unwrap();
        persist_step(&pool, &store.take_changes(), None).await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        reset_identities_tx(&mut tx).await.unwrap();
        tx.commit().await.unwrap();

        let store = load_store(&pool).await.unwrap();
        assert_eq!(store.companies().count(), 1);
        assert_eq!(store.alias_count(), 0);
        assert!(store.high_water_mark().is_none());
        assert_eq!(store.observed_keys().company_count(), 0);
    }
}
