//! Historical backfill trigger and status.

use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, Json};

use super::ApiError;
use crate::backfill::{BackfillStatus, BackfillTicket};
use crate::state::AppState;

/// POST /fetch-historical - returns as soon as the job is queued
pub async fn trigger_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<(StatusCode, Json<BackfillTicket>), ApiError> {
    let ticket = state.service.trigger_backfill()?;
    Ok((StatusCode::ACCEPTED, Json(ticket)))
}

/// GET /fetch-historical/status
pub async fn status_handler(Extension(state): Extension<Arc<AppState>>) -> Json<BackfillStatus> {
    Json(state.service.backfill_status())
}
