//! Open-Meteo response types and their conversion into readings.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use weather_common::{WeatherError, WeatherReading, WeatherResult};

/// Current conditions at a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub latitude: f64,
    pub longitude: f64,
    pub reading: WeatherReading,
}

/// Columnar hourly series as returned by the archive API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub timezone: Option<String>,
    /// Offset of the `hourly.time` wall-clock values from UTC.
    #[serde(default)]
    pub utc_offset_seconds: i64,
    pub hourly: HourlyColumns,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlyColumns {
    pub time: Vec<String>,
    #[serde(default)]
    pub temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    pub surface_pressure: Vec<Option<f64>>,
}

impl HistoricalSeries {
    /// Zip the columns into chronological UTC readings.
    ///
    /// Entries whose time cannot be parsed are skipped; a short value column
    /// yields `None` for the missing positions.
    pub fn readings(&self) -> Vec<WeatherReading> {
        let offset = Duration::seconds(self.utc_offset_seconds);

        self.hourly
            .time
            .iter()
            .enumerate()
            .filter_map(|(i, time)| {
                let local = parse_wall_clock(time)?;
                Some(WeatherReading {
                    timestamp: (local - offset).and_utc(),
                    temperature: self.hourly.temperature_2m.get(i).copied().flatten(),
                    pressure: self.hourly.surface_pressure.get(i).copied().flatten(),
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.hourly.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hourly.time.is_empty()
    }
}

/// Parse Open-Meteo's ISO-8601 wall-clock time (minutes, optionally seconds).
pub(crate) fn parse_wall_clock(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

// ============================================================================
// Forecast (current conditions) wire format
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct ForecastResponse {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub current_weather: Option<CurrentWeatherBlock>,
    #[serde(default)]
    pub current: Option<CurrentBlock>,
}

/// Legacy `current_weather=true` block.
#[derive(Debug, Deserialize)]
pub(crate) struct CurrentWeatherBlock {
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CurrentBlock {
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default, rename = "temperature_2m")]
    pub temperature: Option<f64>,
    #[serde(default, rename = "surface_pressure")]
    pub pressure: Option<f64>,
}

impl ForecastResponse {
    /// Requests are made with `timezone=GMT`, so block times are already UTC.
    pub fn into_current(self, now: DateTime<Utc>) -> WeatherResult<CurrentWeather> {
        if self.current.is_none() && self.current_weather.is_none() {
            return Err(WeatherError::UpstreamMalformed(
                "response has no current conditions".to_string(),
            ));
        }

        let time = self
            .current
            .as_ref()
            .and_then(|c| c.time.as_deref())
            .or_else(|| self.current_weather.as_ref().and_then(|c| c.time.as_deref()))
            .and_then(parse_wall_clock)
            .map(|t| t.and_utc())
            .unwrap_or(now);

        let temperature = self
            .current
            .as_ref()
            .and_then(|c| c.temperature)
            .or_else(|| self.current_weather.as_ref().and_then(|c| c.temperature));

        let pressure = self.current.as_ref().and_then(|c| c.pressure);

        Ok(CurrentWeather {
            latitude: self.latitude,
            longitude: self.longitude,
            reading: WeatherReading::new(time, temperature, pressure),
        })
    }
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub reason: Option<String>,
}
