//! Scripted in-process [`WeatherProvider`].

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use weather_client::{CurrentWeather, HistoricalSeries, WeatherProvider};
use weather_common::{CoordKey, Coordinate, WeatherError, WeatherReading, WeatherResult};

use crate::fixtures::hourly_series;

/// Upstream failure to script. Converted into a fresh [`WeatherError`] per call.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    Transport { timed_out: bool },
    Rejected { status: u16, reason: String },
    Malformed,
}

impl Failure {
    pub fn to_error(&self) -> WeatherError {
        match self {
            Failure::Transport { timed_out } => WeatherError::UpstreamTransport {
                message: "scripted transport failure".to_string(),
                timed_out: *timed_out,
            },
            Failure::Rejected { status, reason } => WeatherError::UpstreamRejected {
                status: *status,
                reason: reason.clone(),
            },
            Failure::Malformed => {
                WeatherError::UpstreamMalformed("scripted malformed body".to_string())
            }
        }
    }
}

/// Recorded historical request.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalCall {
    pub coordinate: CoordKey,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// A provider whose answers, failures, and timing are set up by the test.
///
/// Current conditions return the scripted temperature stamped with the call
/// time. Historical fetches return `hours` synthetic hourly readings starting
/// at the requested start date. With a gate installed, every historical fetch
/// waits for a semaphore permit before answering.
pub struct ScriptedProvider {
    temperature: f64,
    pressure: Option<f64>,
    hours: usize,
    current_failure: Mutex<Option<Failure>>,
    history_failures: HashMap<CoordKey, Failure>,
    gate: Option<Arc<Semaphore>>,
    current_calls: AtomicUsize,
    historical_calls: Mutex<Vec<HistoricalCall>>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            temperature: 21.5,
            pressure: Some(811.2),
            hours: 24,
            current_failure: Mutex::new(None),
            history_failures: HashMap::new(),
            gate: None,
            current_calls: AtomicUsize::new(0),
            historical_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Number of hourly readings returned per historical fetch.
    pub fn with_hours(mut self, hours: usize) -> Self {
        self.hours = hours;
        self
    }

    /// Fail historical fetches for one coordinate.
    pub fn failing_history_at(mut self, coordinate: &Coordinate, failure: Failure) -> Self {
        self.history_failures.insert(coordinate.key(), failure);
        self
    }

    /// Hold every historical fetch until a permit is available on `gate`.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Make current-condition fetches fail (or succeed again with `None`).
    pub fn set_current_failure(&self, failure: Option<Failure>) {
        if let Ok(mut slot) = self.current_failure.lock() {
            *slot = failure;
        }
    }

    pub fn current_calls(&self) -> usize {
        self.current_calls.load(Ordering::SeqCst)
    }

    pub fn historical_calls(&self) -> Vec<HistoricalCall> {
        self.historical_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl WeatherProvider for ScriptedProvider {
    async fn fetch_current(&self, coordinate: &Coordinate) -> WeatherResult<CurrentWeather> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);

        let failure = self.current_failure.lock().ok().and_then(|f| f.clone());
        if let Some(failure) = failure {
            return Err(failure.to_error());
        }

        Ok(CurrentWeather {
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            reading: WeatherReading::new(Utc::now(), Some(self.temperature), self.pressure),
        })
    }

    async fn fetch_historical(
        &self,
        coordinate: &Coordinate,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> WeatherResult<HistoricalSeries> {
        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| Failure::Transport { timed_out: false }.to_error())?;
        }

        if let Ok(mut calls) = self.historical_calls.lock() {
            calls.push(HistoricalCall {
                coordinate: coordinate.key(),
                start_date,
                end_date,
            });
        }

        if let Some(failure) = self.history_failures.get(&coordinate.key()) {
            return Err(failure.to_error());
        }

        Ok(hourly_series(coordinate, start_date, self.hours))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_history_failure() {
        let bad = Coordinate::new(1.0, 1.0).unwrap();
        let good = Coordinate::new(2.0, 2.0).unwrap();
        let provider = ScriptedProvider::new()
            .with_hours(3)
            .failing_history_at(&bad, Failure::Malformed);
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        assert!(provider.fetch_historical(&bad, day, day).await.is_err());
        let series = provider.fetch_historical(&good, day, day).await.unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(provider.historical_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_current_failure_toggles() {
        let provider = ScriptedProvider::new().with_temperature(30.0);
        let point = Coordinate::new(1.0, 1.0).unwrap();

        provider.set_current_failure(Some(Failure::Transport { timed_out: true }));
        assert!(provider.fetch_current(&point).await.is_err());

        provider.set_current_failure(None);
        let current = provider.fetch_current(&point).await.unwrap();
        assert_eq!(current.reading.temperature, Some(30.0));
        assert_eq!(provider.current_calls(), 2);
    }
}
