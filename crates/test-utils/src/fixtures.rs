//! Common test fixtures for weather cache tests.

use chrono::{Duration, NaiveDate, Utc};

use weather_client::{HistoricalSeries, HourlyColumns};
use weather_common::{Coordinate, WeatherReading};

/// Points used across tests.
pub mod points {
    /// Celaya, a known city (id 4014875).
    pub const CELAYA: (f64, f64) = (20.51667, -100.816673);

    /// Guanajuato, a known city (id 4005270).
    pub const GUANAJUATO: (f64, f64) = (21.018579, -101.259102);

    /// Silao, a known city (id 3983058).
    pub const SILAO: (f64, f64) = (20.933331, -101.433327);

    /// Near Valle de Santiago but not on any known city.
    pub const UNAFFILIATED: (f64, f64) = (20.5058, -101.53802);
}

/// Raw Open-Meteo payloads.
pub mod payloads {
    pub const FORECAST: &str = r#"{
        "latitude": 20.5,
        "longitude": -100.8,
        "current_weather": {"time": "2024-09-15T12:00", "temperature": 24.9},
        "current": {"time": "2024-09-15T12:00", "temperature_2m": 25.1, "surface_pressure": 809.6}
    }"#;

    pub const ARCHIVE: &str = r#"{
        "latitude": 20.5,
        "longitude": -100.8,
        "timezone": "America/Mexico_City",
        "utc_offset_seconds": -21600,
        "hourly": {
            "time": ["2019-09-15T00:00", "2019-09-15T01:00"],
            "temperature_2m": [18.2, null],
            "surface_pressure": [810.1, 810.4]
        }
    }"#;
}

/// A reading taken `secs_ago` seconds before now.
pub fn reading_ago(secs_ago: i64, temperature: f64) -> WeatherReading {
    WeatherReading::new(
        Utc::now() - Duration::seconds(secs_ago),
        Some(temperature),
        Some(810.0),
    )
}

/// A UTC-offset hourly series starting at midnight of `start`.
pub fn hourly_series(coordinate: &Coordinate, start: NaiveDate, hours: usize) -> HistoricalSeries {
    let base = start.and_hms_opt(0, 0, 0).unwrap_or_default();

    HistoricalSeries {
        latitude: coordinate.latitude,
        longitude: coordinate.longitude,
        timezone: Some("GMT".to_string()),
        utc_offset_seconds: 0,
        hourly: HourlyColumns {
            time: (0..hours)
                .map(|h| {
                    (base + Duration::hours(h as i64))
                        .format("%Y-%m-%dT%H:%M")
                        .to_string()
                })
                .collect(),
            temperature_2m: (0..hours).map(|h| Some(15.0 + h as f64 * 0.5)).collect(),
            surface_pressure: (0..hours).map(|_| Some(810.0)).collect(),
        },
    }
}
