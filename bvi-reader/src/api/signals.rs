//! Signal totals

use axum::{extract::State, Json};

use crate::api::ApiError;
use crate::db::{self, SignalSummary};
use crate::AppState;

/// GET /api/signals/summary
pub async fn get_signal_summary(State(state): State<AppState>) -> Result<Json<SignalSummary>, ApiError> {
    Ok(Json(db::signal_summary(&state.db).await?))
}
