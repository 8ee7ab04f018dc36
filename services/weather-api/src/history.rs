//! Historical series import for a single city.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use storage::{FastCache, WeatherStore};
use weather_client::WeatherProvider;
use weather_common::{City, RecordIdentity, WeatherReading, WeatherResult};

use crate::config::{HistoryDedupe, HistoryWindow};

/// Fetches a city's rolling history window and appends it to the store.
///
/// A successful append evicts the city's fast cache snapshot, so the next
/// read goes to the store.
pub struct HistoryImporter {
    store: Arc<dyn WeatherStore>,
    cache: Arc<dyn FastCache>,
    provider: Arc<dyn WeatherProvider>,
    window: HistoryWindow,
    dedupe: HistoryDedupe,
}

impl HistoryImporter {
    pub fn new(
        store: Arc<dyn WeatherStore>,
        cache: Arc<dyn FastCache>,
        provider: Arc<dyn WeatherProvider>,
        window: HistoryWindow,
        dedupe: HistoryDedupe,
    ) -> Self {
        Self {
            store,
            cache,
            provider,
            window,
            dedupe,
        }
    }

    /// Fetch the current window for `city` as chronological UTC readings.
    #[instrument(skip(self, city), fields(city = %city.name))]
    pub async fn fetch(&self, city: &City) -> WeatherResult<Vec<WeatherReading>> {
        let (start, end) = self.window.range(Utc::now());
        let series = self
            .provider
            .fetch_historical(&city.coordinate, start, end)
            .await?;

        Ok(series.readings())
    }

    /// Append readings to the city's record, returning how many were written.
    #[instrument(skip(self, city, readings), fields(city = %city.name, fetched = readings.len()))]
    pub async fn persist(&self, city: &City, readings: &[WeatherReading]) -> WeatherResult<usize> {
        let identity = RecordIdentity::from(city);

        let filtered: Vec<WeatherReading>;
        let to_append = match self.dedupe {
            HistoryDedupe::Off => readings,
            HistoryDedupe::SkipCovered => {
                match self.store.latest_historical_timestamp(&identity).await? {
                    Some(until) => {
                        filtered = readings
                            .iter()
                            .filter(|r| r.timestamp > until)
                            .cloned()
                            .collect();
                        &filtered[..]
                    }
                    None => readings,
                }
            }
        };

        if to_append.is_empty() {
            debug!("Nothing new to append");
            return Ok(0);
        }

        self.store
            .append_historical_readings(&identity, to_append)
            .await?;

        if let Err(e) = self.cache.evict(&city.name).await {
            warn!(error = %e, "Failed to evict stale fast cache snapshot");
        }

        Ok(to_append.len())
    }

    /// Fetch then persist.
    pub async fn import(&self, city: &City) -> WeatherResult<usize> {
        let readings = self.fetch(city).await?;
        self.persist(city, &readings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use storage::{MemoryFastCache, MemoryWeatherStore};
    use test_utils::ScriptedProvider;
    use weather_common::CityCatalog;

    fn importer(
        store: Arc<MemoryWeatherStore>,
        dedupe: HistoryDedupe,
    ) -> HistoryImporter {
        importer_with_cache(store, Arc::new(MemoryFastCache::new(2)), dedupe)
    }

    fn importer_with_cache(
        store: Arc<MemoryWeatherStore>,
        cache: Arc<MemoryFastCache>,
        dedupe: HistoryDedupe,
    ) -> HistoryImporter {
        let provider = Arc::new(ScriptedProvider::new().with_hours(48));
        HistoryImporter::new(store, cache, provider, HistoryWindow::default(), dedupe)
    }

    #[tokio::test]
    async fn test_import_appends_unconditionally_by_default() {
        let store = Arc::new(MemoryWeatherStore::new());
        let importer = importer(store.clone(), HistoryDedupe::Off);
        let catalog = CityCatalog::builtin();
        let city = catalog.find_by_name("Irapuato").unwrap();

        assert_eq!(importer.import(city).await.unwrap(), 48);
        assert_eq!(importer.import(city).await.unwrap(), 48);

        let record = store.get("4004330").await.unwrap();
        assert_eq!(record.historical_data.len(), 96);
    }

    #[tokio::test]
    async fn test_skip_covered_drops_repeated_window() {
        let store = Arc::new(MemoryWeatherStore::new());
        let importer = importer(store.clone(), HistoryDedupe::SkipCovered);
        let catalog = CityCatalog::builtin();
        let city = catalog.find_by_name("Irapuato").unwrap();

        assert_eq!(importer.import(city).await.unwrap(), 48);
        assert_eq!(importer.import(city).await.unwrap(), 0);

        let record = store.get("4004330").await.unwrap();
        assert_eq!(record.historical_data.len(), 48);
    }

    #[tokio::test]
    async fn test_append_evicts_cached_snapshot() {
        let store = Arc::new(MemoryWeatherStore::new());
        let cache = Arc::new(MemoryFastCache::new(2));
        let importer = importer_with_cache(store.clone(), cache.clone(), HistoryDedupe::Off);
        let catalog = CityCatalog::builtin();
        let city = catalog.find_by_name("Irapuato").unwrap();

        cache
            .set_with_ttl("Irapuato", "{}", Duration::from_secs(60))
            .await
            .unwrap();
        cache.touch("Irapuato").await.unwrap();

        importer.import(city).await.unwrap();

        assert!(!cache.contains("Irapuato").await);
        assert!(cache.recent().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_outage_does_not_fail_import() {
        let store = Arc::new(MemoryWeatherStore::new());
        let cache = Arc::new(MemoryFastCache::new(2));
        cache.set_available(false);
        let importer = importer_with_cache(store.clone(), cache, HistoryDedupe::Off);
        let catalog = CityCatalog::builtin();
        let city = catalog.find_by_name("Irapuato").unwrap();

        assert_eq!(importer.import(city).await.unwrap(), 48);
        assert_eq!(store.get("4004330").await.unwrap().historical_data.len(), 48);
    }
}
