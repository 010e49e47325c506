//! JSON-lines ingestion boundary
//!
//! Each line is one raw filing as exported by the scraper. Lines that cannot
//! become a [`FilingRecord`] are rejected with a [`MalformedRecord`]
//! diagnostic and never reach the classifier; the rest of the batch carries on.

use bvi_common::{parse_approval_date, DateFormat, FilingId, FilingRecord, FilingStatus};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// Registry ids show up both as JSON strings and as numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s.trim().to_string(),
            RawId::Number(n) => n.to_string(),
        }
    }
}

/// One line of scraper output
#[derive(Debug, Deserialize)]
struct RawFiling {
    #[serde(default, alias = "ttbId", alias = "id")]
    ttb_id: Option<RawId>,
    #[serde(default, alias = "company_name", alias = "filer")]
    filer_name: Option<String>,
    #[serde(default, alias = "brand")]
    brand_name: Option<String>,
    #[serde(default, alias = "fanciful_name", alias = "variant")]
    variant_name: Option<String>,
    #[serde(default, alias = "class_type_code", alias = "class_type")]
    category_code: Option<String>,
    #[serde(default, alias = "approved_date", alias = "date")]
    approval_date: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Diagnostic for a line rejected at the boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    /// 1-based line number in the input
    pub line: usize,
    pub ttb_id: Option<String>,
    pub reason: String,
}

impl fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ttb_id {
            Some(id) => write!(f, "line {} (ttb_id {}): {}", self.line, id, self.reason),
            None => write!(f, "line {}: {}", self.line, self.reason),
        }
    }
}

/// Valid records plus rejections from one input
#[derive(Debug, Default)]
pub struct IngestBatch {
    pub records: Vec<FilingRecord>,
    pub rejected: Vec<MalformedRecord>,
}

impl RawFiling {
    fn into_record(self, format: DateFormat) -> Result<FilingRecord, (Option<String>, String)> {
        let ttb_id = self
            .ttb_id
            .map(RawId::into_string)
            .filter(|id| !id.is_empty())
            .ok_or((None, "missing ttb_id".to_string()))?;

        let raw_date = self
            .approval_date
            .ok_or((Some(ttb_id.clone()), "missing approval_date".to_string()))?;
        let approval_date = parse_approval_date(&raw_date, format)
            .map_err(|e| (Some(ttb_id.clone()), e.to_string()))?;

        // Exports list approved labels unless they say otherwise
        let status = self
            .status
            .as_deref()
            .map(FilingStatus::parse)
            .unwrap_or(FilingStatus::Approved);

        Ok(FilingRecord {
            ttb_id: FilingId::new(ttb_id),
            filer_name: self.filer_name.unwrap_or_default().trim().to_string(),
            brand_name: self.brand_name.unwrap_or_default(),
            variant_name: self.variant_name.unwrap_or_default(),
            category_code: self.category_code.unwrap_or_default().trim().to_string(),
            approval_date,
            status,
        })
    }
}

/// Parse JSON-lines filings. Blank lines are skipped.
pub fn read_jsonl<R: BufRead>(reader: R, format: DateFormat) -> bvi_common::Result<IngestBatch> {
    let mut batch = IngestBatch::default();
    let mut seen: HashSet<FilingId> = HashSet::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let parsed = serde_json::from_str::<RawFiling>(&line)
            .map_err(|e| (None, format!("invalid JSON: {}", e)))
            .and_then(|raw| raw.into_record(format));

        match parsed {
            Ok(record) => {
                if !seen.insert(record.ttb_id.clone()) {
                    batch.rejected.push(MalformedRecord {
                        line: line_no,
                        ttb_id: Some(record.ttb_id.to_string()),
                        reason: "duplicate ttb_id in input".to_string(),
                    });
                    continue;
                }
                batch.records.push(record);
            }
            Err((ttb_id, reason)) => batch.rejected.push(MalformedRecord {
                line: line_no,
                ttb_id,
                reason,
            }),
        }
    }

    for rejected in &batch.rejected {
        warn!("Rejected filing at {}", rejected);
    }

    Ok(batch)
}

/// Read a JSON-lines file from disk
pub fn read_jsonl_file(path: &Path, format: DateFormat) -> bvi_common::Result<IngestBatch> {
    let file = File::open(path)?;
    let batch = read_jsonl(BufReader::new(file), format)?;
    info!(
        "Read {} filings from {} ({} rejected)",
        batch.records.len(),
        path.display(),
        batch.rejected.len()
    );
    Ok(batch)
}
