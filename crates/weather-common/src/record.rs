//! Weather readings and the per-place durable record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::city::City;
use crate::coord::Coordinate;

/// A single point observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub timestamp: DateTime<Utc>,
    /// Air temperature at 2 m, degrees Celsius.
    pub temperature: Option<f64>,
    /// Surface pressure, hPa.
    pub pressure: Option<f64>,
}

impl WeatherReading {
    pub fn new(timestamp: DateTime<Utc>, temperature: Option<f64>, pressure: Option<f64>) -> Self {
        Self {
            timestamp,
            temperature,
            pressure,
        }
    }

    /// True if the reading is no older than `max_age` at `now`.
    pub fn is_fresh(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(max_age) {
            Ok(max_age) => now.signed_duration_since(self.timestamp) <= max_age,
            Err(_) => true,
        }
    }
}

/// Which durable record a write targets.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordIdentity {
    City {
        id: u64,
        name: String,
        coordinate: Coordinate,
    },
    /// A point that matched no known city.
    Unaffiliated(Coordinate),
}

impl RecordIdentity {
    /// Primary key in the durable store.
    pub fn record_key(&self) -> String {
        match self {
            RecordIdentity::City { id, .. } => id.to_string(),
            RecordIdentity::Unaffiliated(coord) => format!("coord:{}", coord.key()),
        }
    }

    pub fn city_id(&self) -> Option<u64> {
        match self {
            RecordIdentity::City { id, .. } => Some(*id),
            RecordIdentity::Unaffiliated(_) => None,
        }
    }

    pub fn city_name(&self) -> Option<&str> {
        match self {
            RecordIdentity::City { name, .. } => Some(name),
            RecordIdentity::Unaffiliated(_) => None,
        }
    }

    pub fn coordinate(&self) -> &Coordinate {
        match self {
            RecordIdentity::City { coordinate, .. } => coordinate,
            RecordIdentity::Unaffiliated(coordinate) => coordinate,
        }
    }
}

impl From<&City> for RecordIdentity {
    fn from(city: &City) -> Self {
        RecordIdentity::City {
            id: city.id,
            name: city.name.clone(),
            coordinate: city.coordinate,
        }
    }
}

/// The durable document for one city (or one unaffiliated point).
///
/// `current_readings` is newest-first and grows by prepend;
/// `historical_data` is chronological and grows by append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub record_key: String,
    pub city_id: Option<u64>,
    pub city_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub current_readings: Vec<WeatherReading>,
    #[serde(default)]
    pub historical_data: Vec<WeatherReading>,
    pub updated_at: DateTime<Utc>,
}

impl WeatherRecord {
    /// An empty record for the given identity.
    pub fn empty(identity: &RecordIdentity, now: DateTime<Utc>) -> Self {
        let coordinate = identity.coordinate();
        Self {
            record_key: identity.record_key(),
            city_id: identity.city_id(),
            city_name: identity.city_name().map(str::to_string),
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            current_readings: Vec::new(),
            historical_data: Vec::new(),
            updated_at: now,
        }
    }

    /// Most recent current reading by timestamp.
    pub fn latest_current(&self) -> Option<&WeatherReading> {
        self.current_readings.iter().max_by_key(|r| r.timestamp)
    }

    /// The latest current reading, if it is within `max_age` of `now`.
    pub fn fresh_current(&self, max_age: Duration, now: DateTime<Utc>) -> Option<&WeatherReading> {
        self.latest_current().filter(|r| r.is_fresh(max_age, now))
    }

    /// Copy of the record with `historical_data` left empty.
    pub fn without_history(&self) -> WeatherRecord {
        WeatherRecord {
            record_key: self.record_key.clone(),
            city_id: self.city_id,
            city_name: self.city_name.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            current_readings: self.current_readings.clone(),
            historical_data: Vec::new(),
            updated_at: self.updated_at,
        }
    }
}
