//! Company identity, alias and filing endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use bvi_common::CompanyId;
use serde::{Deserialize, Serialize};

use crate::api::ApiError;
use crate::db::{self, AliasView, CompanyView, FilingView};
use crate::pagination::{calculate_pagination, PAGE_SIZE};
use crate::AppState;

fn parse_company_id(raw: &str) -> Result<CompanyId, ApiError> {
    raw.parse()
        .map_err(|e: bvi_common::Error| ApiError::BadRequest(e.to_string()))
}

async fn require_company(state: &AppState, company_id: CompanyId) -> Result<CompanyView, ApiError> {
    db::find_company(&state.db, company_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Company not found: {}", company_id)))
}

/// GET /api/companies/:company_id
pub async fn get_company(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
) -> Result<Json<CompanyView>, ApiError> {
    let company_id = parse_company_id(&company_id)?;
    Ok(Json(require_company(&state, company_id).await?))
}

#[derive(Debug, Serialize)]
pub struct AliasesResponse {
    pub company_id: String,
    pub display_name: String,
    pub aliases: Vec<AliasView>,
}

/// GET /api/companies/:company_id/aliases
pub async fn get_company_aliases(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
) -> Result<Json<AliasesResponse>, ApiError> {
    let company_id = parse_company_id(&company_id)?;
    let company = require_company(&state, company_id).await?;
    let aliases = db::list_aliases(&state.db, company_id).await?;

    Ok(Json(AliasesResponse {
        company_id: company.company_id,
        display_name: company.display_name,
        aliases,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
}

fn default_page() -> i64 {
    1
}

#[derive(Debug, Serialize)]
pub struct CompanyFilingsResponse {
    pub company_id: String,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub filings: Vec<FilingView>,
}

/// GET /api/companies/:company_id/filings?page=N
pub async fn get_company_filings(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<CompanyFilingsResponse>, ApiError> {
    let company_id = parse_company_id(&company_id)?;
    let company = require_company(&state, company_id).await?;

    let total = db::count_company_filings(&state.db, company_id).await?;
    let pagination = calculate_pagination(total, query.page);
    let filings = db::list_company_filings(&state.db, company_id, PAGE_SIZE, pagination.offset).await?;

    Ok(Json(CompanyFilingsResponse {
        company_id: company.company_id,
        total,
        page: pagination.page,
        page_size: PAGE_SIZE,
        total_pages: pagination.total_pages,
        filings,
    }))
}
