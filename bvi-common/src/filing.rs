//! Filing records and lifecycle signals

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// External TTB id of a filing.
///
/// Ids are compared numerically when both sides are all-digit strings
/// (ignoring leading zeros), otherwise byte-wise. All-digit ids sort before
/// anything else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilingId(String);

impl FilingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `ORDER BY` terms that sort a TTB id column the same way as `Ord`
    pub fn sql_order_terms(column: &str) -> String {
        let numeric = format!("({c} <> '' AND {c} NOT GLOB '*[^0-9]*')", c = column);
        let digits = format!(
            "(CASE WHEN ltrim({c}, '0') = '' THEN '0' ELSE ltrim({c}, '0') END)",
            c = column
        );
        format!(
            "CASE WHEN {n} THEN 0 ELSE 1 END, \
             CASE WHEN {n} THEN length({d}) END, \
             CASE WHEN {n} THEN {d} END, \
             {c}",
            n = numeric,
            d = digits,
            c = column
        )
    }

    fn numeric_digits(&self) -> Option<&str> {
        if !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit()) {
            let trimmed = self.0.trim_start_matches('0');
            Some(if trimmed.is_empty() { "0" } else { trimmed })
        } else {
            None
        }
    }
}

impl Ord for FilingId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric_digits(), other.numeric_digits()) {
            (Some(a), Some(b)) => a
                .len()
                .cmp(&b.len())
                .then_with(|| a.cmp(b))
                .then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for FilingId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for FilingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FilingId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Registry status of a label approval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingStatus {
    Approved,
    Surrendered,
    Other(String),
}

impl FilingStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "APPROVED" => FilingStatus::Approved,
            "SURRENDERED" => FilingStatus::Surrendered,
            _ => FilingStatus::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FilingStatus::Approved => "approved",
            FilingStatus::Surrendered => "surrendered",
            FilingStatus::Other(s) => s,
        }
    }
}

/// Lifecycle signal assigned once per filing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    NewCompany,
    NewBrand,
    NewProduct,
    Resubmission,
}

impl Signal {
    pub const ALL: [Signal; 4] = [
        Signal::NewCompany,
        Signal::NewBrand,
        Signal::NewProduct,
        Signal::Resubmission,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::NewCompany => "NEW_COMPANY",
            Signal::NewBrand => "NEW_BRAND",
            Signal::NewProduct => "NEW_PRODUCT",
            Signal::Resubmission => "RESUBMISSION",
        }
    }

    /// First occurrence of a (company, brand, variant) key
    pub fn is_first_occurrence(&self) -> bool {
        !matches!(self, Signal::Resubmission)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Signal::ALL
            .into_iter()
            .find(|signal| signal.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown signal: {}", s)))
    }
}

/// One observed label-approval event
///
/// Immutable once observed; the pipeline only ever writes `signal` and
/// `refile_count` alongside the stored row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingRecord {
    pub ttb_id: FilingId,
    /// Raw filer name as submitted (may be empty)
    pub filer_name: String,
    pub brand_name: String,
    /// Product variant (fanciful name), may be empty
    pub variant_name: String,
    pub category_code: String,
    pub approval_date: NaiveDate,
    pub status: FilingStatus,
}

impl FilingRecord {
    pub fn position(&self) -> ReplayPosition {
        ReplayPosition {
            approval_date: self.approval_date,
            ttb_id: self.ttb_id.clone(),
        }
    }
}

/// Position of a filing on the classification timeline.
///
/// Ordered by approval date, then by TTB id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplayPosition {
    pub approval_date: NaiveDate,
    pub ttb_id: FilingId,
}

impl fmt::Display for ReplayPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.approval_date, self.ttb_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filing_id_numeric_order() {
        let mut ids: Vec<FilingId> = ["100", "20", "3", "0099"]
            .into_iter()
            .map(FilingId::from)
            .collect();
        ids.sort();
        let sorted: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(sorted, vec!["3", "20", "0099", "100"]);
    }

    #[test]
    fn test_filing_id_mixed_order() {
        assert!(FilingId::from("999999") < FilingId::from("A1"));
        assert!(FilingId::from("A1") < FilingId::from("B0"));
    }

    #[test]
    fn test_filing_id_leading_zeros_distinct() {
        let a = FilingId::from("007");
        let b = FilingId::from("7");
        assert_ne!(a.cmp(&b), Ordering::Equal);
    }

    #[tokio::test]
    async fn test_sql_order_matches_ord() {
        let pool = crate::db::init_memory_database().await.unwrap();
        let raw = ["100", "A7", "0099", "20", "007", "7", "b1", "000", "0", "A10", "99"];
        for id in raw {
            sqlx::query("INSERT INTO filings (ttb_id, approval_date, status) VALUES (?, '2024-01-01', 'approved')")
                .bind(id)
                .execute(&pool)
                .await
                .unwrap();
        }

        let from_sql: Vec<String> = sqlx::query_scalar(&format!(
            "SELECT ttb_id FROM filings ORDER BY {}",
            FilingId::sql_order_terms("ttb_id")
        ))
        .fetch_all(&pool)
        .await
        .unwrap();

        let mut ids: Vec<FilingId> = raw.into_iter().map(FilingId::from).collect();
        ids.sort();
        let from_ord: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();
        assert_eq!(from_sql, from_ord);
    }

    #[test]
    fn test_signal_round_trip_names() {
        for signal in Signal::ALL {
            assert_eq!(signal.as_str().parse::<Signal>().unwrap(), signal);
        }
        assert!("NEW_THING".parse::<Signal>().is_err());
    }

    #[test]
    fn test_replay_position_orders_by_date_then_id() {
        let early = ReplayPosition {
            approval_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            ttb_id: FilingId::from("900"),
        };
        let same_day = ReplayPosition {
            approval_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            ttb_id: FilingId::from("1000"),
        };
        let later = ReplayPosition {
            approval_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            ttb_id: FilingId::from("1"),
        };
        assert!(early < same_day);
        assert!(same_day < later);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(FilingStatus::parse(" Approved "), FilingStatus::Approved);
        assert_eq!(FilingStatus::parse("SURRENDERED"), FilingStatus::Surrendered);
        assert_eq!(
            FilingStatus::parse("Expired"),
            FilingStatus::Other("Expired".to_string())
        );
    }
}
