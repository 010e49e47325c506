//! Approval date parsing
//!
//! Registry exports carry approval dates as text such as `06/01/2024`. Text
//! dates in slash formats do not sort chronologically as strings, so every
//! date is parsed into a `NaiveDate` at the ingestion boundary and only
//! parsed dates are ever compared.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{Error, Result};

/// Text layout of incoming approval dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// MM/DD/YYYY (registry default)
    #[default]
    UsSlash,
    /// DD/MM/YYYY
    DayFirstSlash,
    /// YYYY-MM-DD
    Iso,
}

impl DateFormat {
    fn pattern(&self) -> &'static str {
        match self {
            DateFormat::UsSlash => "%m/%d/%Y",
            DateFormat::DayFirstSlash => "%d/%m/%Y",
            DateFormat::Iso => "%Y-%m-%d",
        }
    }
}

impl FromStr for DateFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "us_slash" => Ok(DateFormat::UsSlash),
            "day_first_slash" => Ok(DateFormat::DayFirstSlash),
            "iso" => Ok(DateFormat::Iso),
            other => Err(Error::Config(format!("Unknown date format: {}", other))),
        }
    }
}

/// Parse an approval date in the configured text format.
///
/// ISO dates (`YYYY-MM-DD`) are accepted whatever the configured format,
/// since that is how dates are stored once ingested.
pub fn parse_approval_date(raw: &str, format: DateFormat) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("Empty approval date".to_string()));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, DateFormat::Iso.pattern()) {
        return Ok(date);
    }

    NaiveDate::parse_from_str(trimmed, format.pattern()).map_err(|e| {
        Error::InvalidInput(format!(
            "Unparseable approval date '{}' (expected {:?}): {}",
            trimmed, format, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_us_slash() {
        assert_eq!(
            parse_approval_date("06/01/2024", DateFormat::UsSlash).unwrap(),
            ymd(2024, 6, 1)
        );
        assert_eq!(
            parse_approval_date(" 1/5/2024 ", DateFormat::UsSlash).unwrap(),
            ymd(2024, 1, 5)
        );
    }

    #[test]
    fn test_parse_day_first_slash() {
        assert_eq!(
            parse_approval_date("06/01/2024", DateFormat::DayFirstSlash).unwrap(),
            ymd(2024, 1, 6)
        );
        assert_eq!(
            parse_approval_date("31/12/2023", DateFormat::DayFirstSlash).unwrap(),
            ymd(2023, 12, 31)
        );
    }

    #[test]
    fn test_iso_always_accepted() {
        for format in [DateFormat::UsSlash, DateFormat::DayFirstSlash, DateFormat::Iso] {
            assert_eq!(
                parse_approval_date("2024-03-01", format).unwrap(),
                ymd(2024, 3, 1)
            );
        }
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_approval_date("", DateFormat::UsSlash).is_err());
        assert!(parse_approval_date("13/45/2024", DateFormat::UsSlash).is_err());
        assert!(parse_approval_date("31/12/2023", DateFormat::UsSlash).is_err());
        assert!(parse_approval_date("yesterday", DateFormat::Iso).is_err());
    }

    /// Regression: sorting slash-format text dates as strings misorders
    /// records across month and year boundaries.
    #[test]
    fn test_us_slash_text_sort_is_not_chronological() {
        let raw = ["01/15/2024", "12/01/2023", "02/01/2024"];

        let mut as_text = raw.to_vec();
        as_text.sort();
        assert_eq!(as_text, vec!["01/15/2024", "02/01/2024", "12/01/2023"]);

        let mut parsed: Vec<NaiveDate> = raw
            .iter()
            .map(|s| parse_approval_date(s, DateFormat::UsSlash).unwrap())
            .collect();
        parsed.sort();
        assert_eq!(
            parsed,
            vec![ymd(2023, 12, 1), ymd(2024, 1, 15), ymd(2024, 2, 1)]
        );
    }

    /// Regression: day/month/year text dates sort by day-of-month as strings.
    #[test]
    fn test_day_first_text_sort_is_not_chronological() {
        let raw = ["15/01/2024", "02/03/2024", "31/12/2023"];

        let mut as_text = raw.to_vec();
        as_text.sort();
        assert_eq!(as_text, vec!["02/03/2024", "15/01/2024", "31/12/2023"]);

        let mut parsed: Vec<NaiveDate> = raw
            .iter()
            .map(|s| parse_approval_date(s, DateFormat::DayFirstSlash).unwrap())
            .collect();
        parsed.sort();
        assert_eq!(
            parsed,
            vec![ymd(2023, 12, 31), ymd(2024, 1, 15), ymd(2024, 3, 2)]
        );
    }

    #[test]
    fn test_date_format_from_str() {
        assert_eq!("us_slash".parse::<DateFormat>().unwrap(), DateFormat::UsSlash);
        assert_eq!(
            "DAY_FIRST_SLASH".parse::<DateFormat>().unwrap(),
            DateFormat::DayFirstSlash
        );
        assert!("julian".parse::<DateFormat>().is_err());
    }
}
