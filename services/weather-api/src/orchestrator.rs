//! Cache orchestration: fast cache, then durable store, then upstream.
//!
//! Lookups walk the tiers in order and write back down the chain they
//! consulted. Failures of the fast cache or store while reading count as
//! misses; failures while writing back after a successful upstream fetch are
//! logged and swallowed. Upstream failures are returned with their kind.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use storage::{FastCache, WeatherStore};
use weather_client::WeatherProvider;
use weather_common::{
    City, CityCatalog, Coordinate, RecordIdentity, WeatherError, WeatherReading, WeatherRecord,
    WeatherResult,
};

use crate::backfill::{BackfillError, BackfillHandle, BackfillStatus, BackfillTicket};
use crate::config::{CachePolicy, UnaffiliatedPolicy};
use crate::history::HistoryImporter;
use crate::metrics;

// ============================================================================
// Response Types
// ============================================================================

/// Which tier answered a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataSource {
    FastCache,
    DurableStore,
    Upstream,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::FastCache => "fast-cache",
            DataSource::DurableStore => "durable-store",
            DataSource::Upstream => "upstream",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherResponse {
    pub source: DataSource,
    /// Observation time of `data`.
    pub timestamp: DateTime<Utc>,
    pub data: WeatherReading,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryResponse {
    pub source: DataSource,
    pub record: WeatherRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClearResponse {
    pub deleted_count: u64,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Entry point for every weather operation.
pub struct WeatherService {
    catalog: Arc<CityCatalog>,
    store: Arc<dyn WeatherStore>,
    cache: Arc<dyn FastCache>,
    provider: Arc<dyn WeatherProvider>,
    importer: Arc<HistoryImporter>,
    backfill: BackfillHandle,
    policy: CachePolicy,
}

impl WeatherService {
    pub fn new(
        catalog: Arc<CityCatalog>,
        store: Arc<dyn WeatherStore>,
        cache: Arc<dyn FastCache>,
        provider: Arc<dyn WeatherProvider>,
        importer: Arc<HistoryImporter>,
        backfill: BackfillHandle,
        policy: CachePolicy,
    ) -> Self {
        Self {
            catalog,
            store,
            cache,
            provider,
            importer,
            backfill,
            policy,
        }
    }

    pub fn catalog(&self) -> &CityCatalog {
        &self.catalog
    }

    /// Current conditions at a point.
    #[instrument(skip(self))]
    pub async fn get_weather(&self, latitude: f64, longitude: f64) -> WeatherResult<WeatherResponse> {
        let coordinate = Coordinate::new(latitude, longitude)?;
        let city = self.catalog.classify(&coordinate);
        let max_age = self.policy.current_freshness;

        if let Some(city) = city {
            if let Some(record) = self.read_fast_cache(&city.name).await {
                if let Some(reading) = record.fresh_current(max_age, Utc::now()) {
                    return Ok(self.respond(DataSource::FastCache, reading.clone(), Some(city)));
                }
                debug!(city = %city.name, "Cached snapshot has no fresh current reading");
            }
        }

        match self.store.find_fresh_current(&coordinate, max_age).await {
            Ok(Some(record)) => {
                if let Some(reading) = record.latest_current().cloned() {
                    if let Some(city) = city {
                        self.write_through(&city.name, &record.without_history()).await;
                    }
                    return Ok(self.respond(DataSource::DurableStore, reading, city));
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Durable store lookup failed, treating as miss"),
        }

        let current = self
            .provider
            .fetch_current(&coordinate)
            .await
            .inspect_err(metrics::record_upstream_error)?;
        let reading = current.reading;

        match (city, self.policy.unaffiliated) {
            (Some(city), _) => {
                match self
                    .store
                    .upsert_current_reading(&RecordIdentity::from(city), &reading)
                    .await
                {
                    Ok(record) => {
                        self.write_through(&city.name, &record.without_history())
                            .await
                    }
                    Err(e) => warn!(city = %city.name, error = %e, "Failed to persist current reading"),
                }
            }
            (None, UnaffiliatedPolicy::Persist) => {
                if let Err(e) = self
                    .store
                    .upsert_current_reading(&RecordIdentity::Unaffiliated(coordinate), &reading)
                    .await
                {
                    warn!(error = %e, "Failed to persist unaffiliated reading");
                }
            }
            (None, UnaffiliatedPolicy::Skip) => {
                debug!(coord = %coordinate.key(), "Unaffiliated reading not persisted");
            }
        }

        Ok(self.respond(DataSource::Upstream, reading, city))
    }

    /// A city's full record, fetching its history window on a miss.
    ///
    /// Point lookups cache snapshots without history, so a cached snapshot
    /// with empty `historical_data` is a miss here.
    #[instrument(skip(self))]
    pub async fn get_city_history(&self, name: &str) -> WeatherResult<HistoryResponse> {
        let cached = self
            .read_fast_cache(name)
            .await
            .filter(|record| !record.historical_data.is_empty());
        if let Some(record) = cached {
            metrics::record_request(DataSource::FastCache);
            return Ok(HistoryResponse {
                source: DataSource::FastCache,
                record,
            });
        }

        match self.store.find_by_city_name(name).await {
            Ok(Some(record)) => {
                self.write_through(name, &record).await;
                metrics::record_request(DataSource::DurableStore);
                return Ok(HistoryResponse {
                    source: DataSource::DurableStore,
                    record,
                });
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Durable store lookup failed, treating as miss"),
        }

        let city = self
            .catalog
            .find_by_name(name)
            .ok_or_else(|| WeatherError::NotFound(format!("unknown city '{}'", name)))?;

        let readings = self
            .importer
            .fetch(city)
            .await
            .inspect_err(metrics::record_upstream_error)?;

        if let Err(e) = self.importer.persist(city, &readings).await {
            warn!(city = %city.name, error = %e, "Failed to persist historical readings");
        }

        let mut record = WeatherRecord::empty(&RecordIdentity::from(city), Utc::now());
        record.historical_data = readings;

        metrics::record_request(DataSource::Upstream);
        Ok(HistoryResponse {
            source: DataSource::Upstream,
            record,
        })
    }

    /// Queue a backfill of every known city.
    pub fn trigger_backfill(&self) -> Result<BackfillTicket, BackfillError> {
        self.backfill.trigger()
    }

    pub fn backfill_status(&self) -> BackfillStatus {
        self.backfill.status()
    }

    pub fn backfill(&self) -> &BackfillHandle {
        &self.backfill
    }

    /// Delete every durable record and empty the fast cache.
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> WeatherResult<ClearResponse> {
        let deleted_count = self.store.delete_all().await?;

        match self.cache.clear().await {
            Ok(cleared) => debug!(cleared, "Fast cache cleared"),
            Err(e) => warn!(error = %e, "Failed to clear fast cache"),
        }

        info!(deleted_count, "Cleared all weather records");
        Ok(ClearResponse { deleted_count })
    }

    /// Cities in the fast cache's recency list, most recent first.
    pub async fn recent_cities(&self) -> WeatherResult<Vec<String>> {
        self.cache.recent().await
    }

    fn respond(&self, source: DataSource, reading: WeatherReading, city: Option<&City>) -> WeatherResponse {
        metrics::record_request(source);
        WeatherResponse {
            source,
            timestamp: reading.timestamp,
            data: reading,
            city: city.map(|c| c.name.clone()),
        }
    }

    /// Cached snapshot for `key`; cache errors and unreadable values are misses.
    async fn read_fast_cache(&self, key: &str) -> Option<WeatherRecord> {
        let raw = match self.cache.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "Fast cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(key, error = %e, "Discarding unreadable fast cache entry");
                if let Err(e) = self.cache.evict(key).await {
                    debug!(key, error = %e, "Failed to evict unreadable entry");
                }
                None
            }
        }
    }

    /// Store the snapshot and mark it most recently used, evicting if over the limit.
    async fn write_through(&self, key: &str, record: &WeatherRecord) {
        let value = match serde_json::to_string(record) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize snapshot");
                return;
            }
        };

        if let Err(e) = self
            .cache
            .set_with_ttl(key, &value, self.policy.fast_cache_ttl)
            .await
        {
            warn!(key, error = %e, "Fast cache write failed");
            return;
        }

        match self.cache.touch(key).await {
            Ok(Some(evicted)) => {
                info!(key, evicted = %evicted, "Evicted least recently used city");
                metrics::record_eviction();
            }
            Ok(None) => {}
            Err(e) => warn!(key, error = %e, "Fast cache touch failed"),
        }
    }
}
