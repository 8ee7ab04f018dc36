//! Point weather, city history, and cache administration handlers.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use serde::Deserialize;

use weather_common::{City, Coordinate, WeatherError};

use super::ApiError;
use crate::orchestrator::{ClearResponse, HistoryResponse, WeatherResponse};
use crate::state::AppState;

/// Raw query parameters; parsed by hand so bad input gets our error body.
#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    pub lat: Option<String>,
    pub lon: Option<String>,
}

/// GET /weather?lat=..&lon=..
pub async fn weather_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<WeatherQuery>,
) -> Result<Json<WeatherResponse>, ApiError> {
    let lat = query
        .lat
        .ok_or_else(|| WeatherError::InvalidInput("missing required parameter: lat".into()))?;
    let lon = query
        .lon
        .ok_or_else(|| WeatherError::InvalidInput("missing required parameter: lon".into()))?;
    let coordinate = Coordinate::parse(&lat, &lon)?;

    let response = state
        .service
        .get_weather(coordinate.latitude, coordinate.longitude)
        .await?;
    Ok(Json(response))
}

/// GET /history/:city
pub async fn history_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(city): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let response = state.service.get_city_history(&city).await?;
    Ok(Json(response))
}

/// DELETE /weather
pub async fn clear_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<ClearResponse>, ApiError> {
    let response = state.service.clear_all().await?;
    Ok(Json(response))
}

/// GET /cache/recent
pub async fn recent_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    let recent = state.service.recent_cities().await?;
    Ok(Json(recent))
}

/// GET /cities
pub async fn cities_handler(Extension(state): Extension<Arc<AppState>>) -> Json<Vec<City>> {
    Json(state.service.catalog().cities().to_vec())
}
