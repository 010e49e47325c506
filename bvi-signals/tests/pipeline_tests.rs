//! End-to-end classification against an on-disk database

use bvi_common::config::TomlConfig;
use bvi_common::db::init_database;
use bvi_common::{DateFormat, Signal, UNKNOWN_FILER_ID};
use bvi_signals::db::filings::load_stats;
use bvi_signals::ingest::read_jsonl_file;
use bvi_signals::{ClassifyError, Pipeline, SignalStore};
use sqlx::{Row, SqlitePool};
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

fn write_jsonl(dir: &Path, name: &str, lines: &[&str]) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    path
}

async fn row(pool: &SqlitePool, ttb_id: &str) -> (String, Option<i64>, String) {
    let row = sqlx::query("SELECT signal, refile_count, company_id FROM filings WHERE ttb_id = ?")
        .bind(ttb_id)
        .fetch_one(pool)
        .await
        .unwrap();
    (row.get("signal"), row.get("refile_count"), row.get("company_id"))
}

async fn run_file(pipeline: &mut Pipeline, path: &Path, format: DateFormat) {
    let batch = read_jsonl_file(path, format).unwrap();
    pipeline.ingest(&batch).await.unwrap();
    pipeline.classify_pending().await.unwrap();
}

#[tokio::test]
async fn test_acme_scenarios_end_to_end() {
    let dir = TempDir::new().unwrap();
    let input = write_jsonl(
        dir.path(),
        "filings.jsonl",
        &[
            r#"{"ttb_id": "24001", "company_name": "Acme Spirits LLC", "brand_name": "Acme Gin", "fanciful_name": "", "class_type_code": "140", "approval_date": "01/01/2024", "status": "APPROVED"}"#,
            r#"{"ttb_id": "24003", "company_name": "ACME SPIRITS, L.L.C.", "brand_name": "Acme Gin", "fanciful_name": "", "class_type_code": "140", "approval_date": "06/01/2024", "status": "APPROVED"}"#,
            r#"{"ttb_id": "24002", "company_name": "Acme Spirits LLC", "brand_name": "Acme Vodka", "class_type_code": "141", "approval_date": "03/01/2024", "status": "APPROVED"}"#,
            r#"{"ttb_id": "24004", "company_name": "Widget Co, Brand Holdings LLC", "brand_name": "Widget", "approval_date": "03/15/2024"}"#,
            r#"{"ttb_id": "24005", "company_name": "", "brand_name": "Mystery Wine", "approval_date": "04/01/2024"}"#,
            r#"{"ttb_id": "24006", "company_name": "Broken", "approval_date": "2024/99/99"}"#,
        ],
    );

    let pool = init_database(&dir.path().join("bvi.db")).await.unwrap();
    let mut pipeline = Pipeline::open(pool.clone(), &TomlConfig::default()).await.unwrap();
    run_file(&mut pipeline, &input, DateFormat::UsSlash).await;

    let a = row(&pool, "24001").await;
    let b = row(&pool, "24003").await;
    let c = row(&pool, "24002").await;
    assert_eq!((a.0.as_str(), a.1), ("NEW_COMPANY", Some(1)));
    assert_eq!((c.0.as_str(), c.1), ("NEW_BRAND", Some(0)));
    assert_eq!(b.0, "RESUBMISSION");
    assert_eq!(a.2, b.2);

    let widget = row(&pool, "24004").await;
    let company = pipeline.store().company(&widget.2.parse().unwrap()).unwrap();
    assert_eq!(company.display_name, "Brand Holdings LLC");
    assert_eq!(company.dba_names, vec!["Widget Co"]);

    let unknown = row(&pool, "24005").await;
    assert_eq!(unknown.2, UNKNOWN_FILER_ID.to_string());

    let stats = load_stats(&pool).await.unwrap();
    assert_eq!(stats.filings, 5);
    assert_eq!(stats.unclassified, 0);
    assert_eq!(stats.by_signal[Signal::NewCompany.as_str()], 3);
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("bvi.db");
    let first = write_jsonl(
        dir.path(),
        "first.jsonl",
        &[r#"{"ttb_id": "1", "company_name": "Acme Spirits LLC", "brand_name": "Acme Gin", "approval_date": "2024-01-01"}"#],
    );
    let second = write_jsonl(
        dir.path(),
        "second.jsonl",
        &[
            r#"{"ttb_id": "2", "company_name": "Acme Spirits, LLC", "brand_name": "ACME GIN", "approval_date": "2024-02-01"}"#,
            r#"{"ttb_id": "3", "company_name": "Acme Spirits LLC", "brand_name": "Acme Gin", "approval_date": "2024-03-01"}"#,
        ],
    );

    {
        let pool = init_database(&db_path).await.unwrap();
        let mut pipeline = Pipeline::open(pool.clone(), &TomlConfig::default()).await.unwrap();
        run_file(&mut pipeline, &first, DateFormat::Iso).await;
        pool.close().await;
    }

    let pool = init_database(&db_path).await.unwrap();
    let mut pipeline = Pipeline::open(pool.clone(), &TomlConfig::default()).await.unwrap();
    run_file(&mut pipeline, &second, DateFormat::Iso).await;

    assert_eq!(row(&pool, "1").await.1, Some(2));
    assert_eq!(row(&pool, "2").await.0, "RESUBMISSION");
    assert_eq!(row(&pool, "3").await.0, "RESUBMISSION");
}

#[tokio::test]
async fn test_day_first_text_dates_classify_chronologically() {
    // 02/03/2024 is 2 March and 10/02/2024 is 10 February. Compared as text
    // "02/03" sorts first and would wrongly make the March filing the
    // company's first.
    let dir = TempDir::new().unwrap();
    let input = write_jsonl(
        dir.path(),
        "filings.jsonl",
        &[
            r#"{"ttb_id": "1", "company_name": "Acme Spirits LLC", "brand_name": "Acme Gin", "approval_date": "02/03/2024"}"#,
            r#"{"ttb_id": "2", "company_name": "Acme Spirits LLC", "brand_name": "Acme Rum", "approval_date": "10/02/2024"}"#,
        ],
    );

    let pool = init_database(&dir.path().join("bvi.db")).await.unwrap();
    let mut pipeline = Pipeline::open(pool.clone(), &TomlConfig::default()).await.unwrap();
    run_file(&mut pipeline, &input, DateFormat::DayFirstSlash).await;

    assert_eq!(row(&pool, "2").await.0, "NEW_COMPANY");
    assert_eq!(row(&pool, "1").await.0, "NEW_BRAND");
}

#[tokio::test]
async fn test_late_arrival_needs_reclassify() {
    let dir = TempDir::new().unwrap();
    let on_time = write_jsonl(
        dir.path(),
        "on_time.jsonl",
        &[r#"{"ttb_id": "5", "company_name": "Acme Spirits LLC", "brand_name": "Acme Gin", "approval_date": "2024-05-01"}"#],
    );
    let late = write_jsonl(
        dir.path(),
        "late.jsonl",
        &[r#"{"ttb_id": "4", "company_name": "Acme Spirits LLC", "brand_name": "Acme Gin", "approval_date": "2024-04-01"}"#],
    );

    let pool = init_database(&dir.path().join("bvi.db")).await.unwrap();
    let mut pipeline = Pipeline::open(pool.clone(), &TomlConfig::default()).await.unwrap();
    run_file(&mut pipeline, &on_time, DateFormat::Iso).await;

    let batch = read_jsonl_file(&late, DateFormat::Iso).unwrap();
    pipeline.ingest(&batch).await.unwrap();
    let err = pipeline.classify_pending().await.unwrap_err();
    assert!(matches!(err, ClassifyError::NonMonotonicReplay { .. }));
    assert!(err.is_integrity_error());

    pipeline.reclassify().await.unwrap();
    assert_eq!(row(&pool, "4").await, ("NEW_COMPANY".to_string(), Some(1), row(&pool, "5").await.2));
    assert_eq!(row(&pool, "5").await.0, "RESUBMISSION");
}
