//! HTTP API handlers for bvi-reader

pub mod companies;
pub mod error;
pub mod filings;
pub mod health;
pub mod signals;

pub use companies::{get_company, get_company_aliases, get_company_filings};
pub use error::ApiError;
pub use filings::get_filing;
pub use health::health_routes;
pub use signals::get_signal_summary;
