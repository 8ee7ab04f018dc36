//! Geographic coordinates and their normalized lookup keys.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{WeatherError, WeatherResult};

/// Decimal places kept when normalizing a coordinate into a key.
pub const KEY_PRECISION: i32 = 6;

/// A validated WGS84 point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting non-finite or out-of-range values.
    pub fn new(latitude: f64, longitude: f64) -> WeatherResult<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(WeatherError::InvalidInput(format!(
                "latitude must be within [-90, 90], got {}",
                latitude
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(WeatherError::InvalidInput(format!(
                "longitude must be within [-180, 180], got {}",
                longitude
            )));
        }

        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Parse a coordinate from raw query parameter strings.
    pub fn parse(latitude: &str, longitude: &str) -> WeatherResult<Self> {
        let lat = latitude.trim().parse::<f64>().map_err(|_| {
            WeatherError::InvalidInput(format!("latitude is not a number: '{}'", latitude))
        })?;
        let lon = longitude.trim().parse::<f64>().map_err(|_| {
            WeatherError::InvalidInput(format!("longitude is not a number: '{}'", longitude))
        })?;

        Self::new(lat, lon)
    }

    /// Normalized key; two coordinates name the same place iff their keys match.
    pub fn key(&self) -> CoordKey {
        CoordKey(format!(
            "{:.6},{:.6}",
            round_component(self.latitude),
            round_component(self.longitude)
        ))
    }
}

fn round_component(value: f64) -> f64 {
    let scale = 10f64.powi(KEY_PRECISION);
    let rounded = (value * scale).round() / scale;
    // Avoid "-0.000000" and "0.000000" naming different places.
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// A coordinate rounded to six decimal places, formatted as `"lat,lon"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoordKey(String);

impl CoordKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CoordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let c = Coordinate::new(20.5058, -101.53802).unwrap();
        assert_eq!(c.key().as_str(), "20.505800,-101.538020");
    }

    #[test]
    fn test_key_stable_under_sub_precision_noise() {
        let base = Coordinate::new(21.018579, -101.259102).unwrap();
        let noisy = Coordinate::new(21.0185789999, -101.2591020004).unwrap();
        assert_eq!(base.key(), noisy.key());
    }

    #[test]
    fn test_key_distinguishes_sixth_decimal() {
        let a = Coordinate::new(20.000001, -100.0).unwrap();
        let b = Coordinate::new(20.000002, -100.0).unwrap();
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn test_negative_zero_normalized() {
        let a = Coordinate::new(-0.0000001, 0.0).unwrap();
        let b = Coordinate::new(0.0, -0.0).unwrap();
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().as_str(), "0.000000,0.000000");
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(Coordinate::new(90.5, 0.0).is_err());
        assert!(Coordinate::new(0.0, -180.01).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
        assert!(Coordinate::new(90.0, 180.0).is_ok());
    }

    #[test]
    fn test_parse() {
        let c = Coordinate::parse(" 20.5 ", "-101.2").unwrap();
        assert_eq!(c.latitude, 20.5);
        assert_eq!(c.longitude, -101.2);

        let err = Coordinate::parse("abc", "1").unwrap_err();
        assert!(matches!(err, WeatherError::InvalidInput(_)));
        assert!(Coordinate::parse("", "1").is_err());
    }
}
