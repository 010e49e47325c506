//! Per-filing signal lookup

use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::ApiError;
use crate::db::{self, FilingView};
use crate::AppState;

/// GET /api/filings/:ttb_id
pub async fn get_filing(
    State(state): State<AppState>,
    Path(ttb_id): Path<String>,
) -> Result<Json<FilingView>, ApiError> {
    let ttb_id = ttb_id.trim();
    db::find_filing(&state.db, ttb_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Filing not found: {}", ttb_id)))
}
