//! Upstream weather provider.
//!
//! [`WeatherProvider`] is the seam the orchestrator and backfill worker call
//! through; [`OpenMeteoClient`] is the production implementation.

pub mod client;
pub mod types;

pub use client::{OpenMeteoClient, OpenMeteoConfig};
pub use types::{CurrentWeather, HistoricalSeries, HourlyColumns};

use async_trait::async_trait;
use chrono::NaiveDate;

use weather_common::{Coordinate, WeatherResult};

/// Source of current and historical weather.
///
/// Implementations perform no retries; each call carries its own timeout.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn fetch_current(&self, coordinate: &Coordinate) -> WeatherResult<CurrentWeather>;

    /// Hourly series for the inclusive date range.
    async fn fetch_historical(
        &self,
        coordinate: &Coordinate,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> WeatherResult<HistoricalSeries>;
}
