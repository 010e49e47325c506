//! # BevAlc Intelligence Common Library
//!
//! Shared code for the filing-signal pipeline and the read-only reader:
//! - Filing and company identity domain types
//! - Approval date parsing
//! - Configuration loading and root folder resolution
//! - SQLite initialization, schema sync and migrations

pub mod company;
pub mod config;
pub mod dates;
pub mod db;
pub mod error;
pub mod filing;

pub use company::{AliasEntry, CompanyId, CompanyIdentity, UNKNOWN_FILER_ID, UNKNOWN_FILER_NAME};
pub use dates::{parse_approval_date, DateFormat};
pub use error::{Error, Result};
pub use filing::{FilingId, FilingRecord, FilingStatus, ReplayPosition, Signal};
