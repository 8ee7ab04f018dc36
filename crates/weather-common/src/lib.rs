//! Common types and utilities shared across the weather cache services.

pub mod city;
pub mod coord;
pub mod error;
pub mod record;

pub use city::{City, CityCatalog};
pub use coord::{CoordKey, Coordinate};
pub use error::{WeatherError, WeatherResult};
pub use record::{RecordIdentity, WeatherReading, WeatherRecord};
