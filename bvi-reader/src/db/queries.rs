//! Read queries over classification results

use bvi_common::{CompanyId, FilingId, Signal};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

/// One filing with its signal and resolved company
#[derive(Debug, Clone, Serialize)]
pub struct FilingView {
    pub ttb_id: String,
    pub filer_name: String,
    pub brand_name: String,
    pub variant_name: String,
    pub category_code: String,
    pub approval_date: String,
    pub status: String,
    pub company_id: Option<String>,
    pub company_name: Option<String>,
    pub signal: Option<String>,
    /// Only meaningful on first-occurrence filings
    pub refile_count: Option<i64>,
    pub classified_at: Option<String>,
}

const FILING_VIEW_SELECT: &str = r#"
    SELECT f.ttb_id, f.filer_name, f.brand_name, f.variant_name, f.category_code,
           f.approval_date, f.status, f.company_id, c.display_name AS company_name,
           f.signal, f.refile_count, CAST(f.classified_at AS TEXT) AS classified_at
    FROM filings f
    LEFT JOIN companies c ON c.company_id = f.company_id
"#;

fn filing_from_row(row: &SqliteRow) -> FilingView {
    FilingView {
        ttb_id: row.get("ttb_id"),
        filer_name: row.get("filer_name"),
        brand_name: row.get("brand_name"),
        variant_name: row.get("variant_name"),
        category_code: row.get("category_code"),
        approval_date: row.get("approval_date"),
        status: row.get("status"),
        company_id: row.get("company_id"),
        company_name: row.get("company_name"),
        signal: row.get("signal"),
        refile_count: row.get("refile_count"),
        classified_at: row.get("classified_at"),
    }
}

pub async fn find_filing(pool: &SqlitePool, ttb_id: &str) -> Result<Option<FilingView>, sqlx::Error> {
    let row = sqlx::query(&format!("{} WHERE f.ttb_id = ?", FILING_VIEW_SELECT))
        .bind(ttb_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(filing_from_row))
}

/// Canonical identity with display-only trade names
#[derive(Debug, Clone, Serialize)]
pub struct CompanyView {
    pub company_id: String,
    pub display_name: String,
    pub normalized_name: String,
    pub dba_names: Vec<String>,
    pub first_seen: Option<String>,
    pub filing_count: i64,
}

pub async fn find_company(pool: &SqlitePool, company_id: CompanyId) -> Result<Option<CompanyView>, sqlx::Error> {
    let id = company_id.to_string();
    let row = sqlx::query(
        r#"
        SELECT c.company_id, c.display_name, c.normalized_name, o.first_seen,
               (SELECT COUNT(*) FROM filings f WHERE f.company_id = c.company_id) AS filing_count
        FROM companies c
        LEFT JOIN observed_companies o ON o.company_id = c.company_id
        WHERE c.company_id = ?
        "#,
    )
    .bind(&id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let dba_names: Vec<String> =
        sqlx::query_scalar("SELECT dba_name FROM company_dbas WHERE company_id = ? ORDER BY rowid")
            .bind(&id)
            .fetch_all(pool)
            .await?;

    Ok(Some(CompanyView {
        company_id: row.get("company_id"),
        display_name: row.get("display_name"),
        normalized_name: row.get("normalized_name"),
        dba_names,
        first_seen: row.get("first_seen"),
        filing_count: row.get("filing_count"),
    }))
}

#[derive(Debug, Clone, Serialize)]
pub struct AliasView {
    pub raw_name: String,
    pub normalized_name: String,
}

/// Raw names bound to a company, in binding order
pub async fn list_aliases(pool: &SqlitePool, company_id: CompanyId) -> Result<Vec<AliasView>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT raw_name, normalized_name FROM company_aliases WHERE company_id = ? ORDER BY rowid",
    )
    .bind(company_id.to_string())
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| AliasView {
            raw_name: row.get("raw_name"),
            normalized_name: row.get("normalized_name"),
        })
        .collect())
}

pub async fn count_company_filings(pool: &SqlitePool, company_id: CompanyId) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM filings WHERE company_id = ?")
        .bind(company_id.to_string())
        .fetch_one(pool)
        .await
}

/// One page of a company's filings in timeline order
pub async fn list_company_filings(
    pool: &SqlitePool,
    company_id: CompanyId,
    limit: i64,
    offset: i64,
) -> Result<Vec<FilingView>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "{} WHERE f.company_id = ? ORDER BY f.approval_date, {} LIMIT ? OFFSET ?",
        FILING_VIEW_SELECT,
        FilingId::sql_order_terms("f.ttb_id")
    ))
    .bind(company_id.to_string())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(filing_from_row).collect())
}

/// Signal totals across all filings
#[derive(Debug, Clone, Serialize)]
pub struct SignalSummary {
    pub filings: i64,
    pub unclassified: i64,
    pub by_signal: BTreeMap<String, i64>,
    pub companies: i64,
    pub aliases: i64,
    /// Last classified position, if any run has completed a record
    pub high_water_date: Option<String>,
}

pub async fn signal_summary(pool: &SqlitePool) -> Result<SignalSummary, sqlx::Error> {
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
    let high_water_date: Option<String> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = 'classifier_hwm_date'")
            .fetch_optional(pool)
            .await?
            .flatten();

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

    Ok(SignalSummary {
        filings,
        unclassified,
        by_signal,
        companies,
        aliases,
        high_water_date,
    })
}
