//! bvi-reader library - read-only access to classification results
//!
//! Serves per-filing signals and refile counts, per-company identities,
//! aliases and filings, and signal totals. The database is opened read-only;
//! a concurrent classification run is the only writer.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod pagination;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (read-only)
    pub db: SqlitePool,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    let api = Router::new()
        .route("/api/filings/:ttb_id", get(api::get_filing))
        .route("/api/companies/:company_id", get(api::get_company))
        .route("/api/companies/:company_id/aliases", get(api::get_company_aliases))
        .route("/api/companies/:company_id/filings", get(api::get_company_filings))
        .route("/api/signals/summary", get(api::get_signal_summary));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
