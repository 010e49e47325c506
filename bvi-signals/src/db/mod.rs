//! Database access for bvi-signals
//!
//! `filings` covers the ingested records and reporting queries; `state`
//! loads and persists the classifier's working state.

pub mod filings;
pub mod state;
