//! HTTP request handlers for the weather API.

pub mod backfill;
pub mod health;
pub mod weather;

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use weather_common::WeatherError;

use crate::backfill::BackfillError;
use crate::state::AppState;

/// Error body: `{"error": code, "message": text}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

/// Handler error, rendered as a status plus [`ErrorBody`].
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl From<WeatherError> for ApiError {
    fn from(err: WeatherError) -> Self {
        Self {
            status: StatusCode::from_u16(err.http_status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<BackfillError> for ApiError {
    fn from(err: BackfillError) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

/// Build the HTTP router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/weather",
            get(weather::weather_handler).delete(weather::clear_handler),
        )
        .route("/history/:city", get(weather::history_handler))
        .route("/cache/recent", get(weather::recent_handler))
        .route("/cities", get(weather::cities_handler))
        .route("/fetch-historical", post(backfill::trigger_handler))
        .route("/fetch-historical/status", get(backfill::status_handler))
        .route("/health", get(health::health_handler))
        .route("/ready", get(health::ready_handler))
        .route("/metrics", get(health::metrics_handler))
        .layer(Extension(state))
}
