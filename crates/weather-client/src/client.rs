//! Open-Meteo HTTP client.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use weather_common::{Coordinate, WeatherError, WeatherResult};

use crate::types::{CurrentWeather, ErrorBody, ForecastResponse, HistoricalSeries};
use crate::WeatherProvider;

/// Configuration for the Open-Meteo client.
#[derive(Debug, Clone)]
pub struct OpenMeteoConfig {
    /// Base URL of the forecast API (current conditions)
    pub forecast_base_url: String,
    /// Base URL of the historical archive API
    pub archive_base_url: String,
    pub current_timeout: Duration,
    pub historical_timeout: Duration,
}

impl Default for OpenMeteoConfig {
    fn default() -> Self {
        Self {
            forecast_base_url: "https://api.open-meteo.com/v1".to_string(),
            archive_base_url: "https://archive-api.open-meteo.com/v1".to_string(),
            current_timeout: Duration::from_secs(5),
            historical_timeout: Duration::from_secs(30),
        }
    }
}

/// Open-Meteo implementation of [`WeatherProvider`].
pub struct OpenMeteoClient {
    client: Client,
    config: OpenMeteoConfig,
}

impl OpenMeteoClient {
    pub fn new(config: OpenMeteoConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("weather-cache/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> WeatherResult<T> {
        let response = self
            .client
            .get(url.as_str())
            .query(query)
            .timeout(timeout)
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response).await?;

        let body = response.text().await.map_err(transport_error)?;

        serde_json::from_str(&body).map_err(|e| {
            warn!(url = %url, error = %e, "Unparseable upstream body");
            WeatherError::UpstreamMalformed(e.to_string())
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoClient {
    #[instrument(skip(self), fields(lat = coordinate.latitude, lon = coordinate.longitude))]
    async fn fetch_current(&self, coordinate: &Coordinate) -> WeatherResult<CurrentWeather> {
        let url = format!(
            "{}/forecast",
            self.config.forecast_base_url.trim_end_matches('/')
        );
        let query = [
            ("latitude", coordinate.latitude.to_string()),
            ("longitude", coordinate.longitude.to_string()),
            ("current_weather", "true".to_string()),
            ("current", "temperature_2m,surface_pressure".to_string()),
            ("timezone", "GMT".to_string()),
        ];

        let response: ForecastResponse = self
            .get_json(url, &query, self.config.current_timeout)
            .await?;

        debug!("Fetched current conditions");
        response.into_current(Utc::now())
    }

    #[instrument(skip(self), fields(lat = coordinate.latitude, lon = coordinate.longitude))]
    async fn fetch_historical(
        &self,
        coordinate: &Coordinate,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> WeatherResult<HistoricalSeries> {
        if start_date > end_date {
            return Err(WeatherError::InvalidInput(format!(
                "start date {} is after end date {}",
                start_date, end_date
            )));
        }

        let url = format!(
            "{}/archive",
            self.config.archive_base_url.trim_end_matches('/')
        );
        let query = [
            ("latitude", coordinate.latitude.to_string()),
            ("longitude", coordinate.longitude.to_string()),
            ("start_date", start_date.format("%Y-%m-%d").to_string()),
            ("end_date", end_date.format("%Y-%m-%d").to_string()),
            ("hourly", "temperature_2m,surface_pressure".to_string()),
            ("timezone", "auto".to_string()),
        ];

        let series: HistoricalSeries = self
            .get_json(url, &query, self.config.historical_timeout)
            .await?;

        debug!(hours = series.len(), "Fetched historical series");
        Ok(series)
    }
}

fn transport_error(e: reqwest::Error) -> WeatherError {
    WeatherError::UpstreamTransport {
        timed_out: e.is_timeout(),
        message: e.to_string(),
    }
}

async fn check_status(response: Response) -> WeatherResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let reason = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.reason)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_string()
        });

    warn!(status = status.as_u16(), reason = %reason, "Upstream rejected request");
    Err(WeatherError::UpstreamRejected {
        status: status.as_u16(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OpenMeteoConfig::default();
        assert_eq!(config.current_timeout, Duration::from_secs(5));
        assert_eq!(config.historical_timeout, Duration::from_secs(30));
        assert!(config.archive_base_url.starts_with("https://archive-api."));
    }

    #[tokio::test]
    async fn test_inverted_range_rejected_without_request() {
        let client = OpenMeteoClient::new(OpenMeteoConfig {
            archive_base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        })
        .unwrap();
        let coord = Coordinate::new(20.0, -101.0).unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 9, 15).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();

        let err = client.fetch_historical(&coord, start, end).await.unwrap_err();
        assert!(matches!(err, WeatherError::InvalidInput(_)));
    }
}
