//! In-memory store and cache implementations.
//!
//! Same contracts as the PostgreSQL and Redis adapters, held behind a single
//! lock each. Both can be switched into an "unavailable" mode where every
//! call fails with `StoreUnavailable`, for exercising degraded paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use weather_common::{
    Coordinate, RecordIdentity, WeatherError, WeatherReading, WeatherRecord, WeatherResult,
};

use crate::cache::FastCache;
use crate::store::WeatherStore;

// ============================================================================
// Durable store
// ============================================================================

struct StoredRecord {
    record: WeatherRecord,
    coord_key: String,
    latest_current_at: Option<DateTime<Utc>>,
    historical_until: Option<DateTime<Utc>>,
}

/// In-memory [`WeatherStore`].
#[derive(Default)]
pub struct MemoryWeatherStore {
    records: Mutex<HashMap<String, StoredRecord>>,
    unavailable: AtomicBool,
}

impl MemoryWeatherStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Snapshot of a record by key.
    pub async fn get(&self, record_key: &str) -> Option<WeatherRecord> {
        self.records
            .lock()
            .await
            .get(record_key)
            .map(|s| s.record.clone())
    }

    fn check(&self) -> WeatherResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(WeatherError::StoreUnavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn entry<'a>(
        records: &'a mut HashMap<String, StoredRecord>,
        identity: &RecordIdentity,
        now: DateTime<Utc>,
    ) -> &'a mut StoredRecord {
        records
            .entry(identity.record_key())
            .or_insert_with(|| StoredRecord {
                record: WeatherRecord::empty(identity, now),
                coord_key: identity.coordinate().key().to_string(),
                latest_current_at: None,
                historical_until: None,
            })
    }
}

#[async_trait]
impl WeatherStore for MemoryWeatherStore {
    async fn upsert_current_reading(
        &self,
        identity: &RecordIdentity,
        reading: &WeatherReading,
    ) -> WeatherResult<WeatherRecord> {
        self.check()?;
        let now = Utc::now();
        let mut records = self.records.lock().await;
        let stored = Self::entry(&mut records, identity, now);

        stored.record.current_readings.insert(0, reading.clone());
        stored.record.updated_at = now;
        stored.latest_current_at = stored.latest_current_at.max(Some(reading.timestamp));

        Ok(stored.record.clone())
    }

    async fn append_historical_readings(
        &self,
        identity: &RecordIdentity,
        readings: &[WeatherReading],
    ) -> WeatherResult<()> {
        self.check()?;
        let now = Utc::now();
        let mut records = self.records.lock().await;
        let stored = Self::entry(&mut records, identity, now);

        stored.record.historical_data.extend_from_slice(readings);
        stored.record.updated_at = now;
        stored.historical_until = stored
            .historical_until
            .max(readings.iter().map(|r| r.timestamp).max());

        Ok(())
    }

    async fn find_fresh_current(
        &self,
        coordinate: &Coordinate,
        max_age: Duration,
    ) -> WeatherResult<Option<WeatherRecord>> {
        self.check()?;
        let max_age = chrono::Duration::from_std(max_age)
            .map_err(|e| WeatherError::InvalidInput(format!("Invalid max age: {}", e)))?;
        // No cutoff when the window reaches past the representable range.
        let cutoff = Utc::now().checked_sub_signed(max_age);
        let key = coordinate.key().to_string();

        let records = self.records.lock().await;
        Ok(records
            .values()
            .filter(|s| s.coord_key == key)
            .filter(|s| {
                s.latest_current_at
                    .is_some_and(|t| cutoff.map_or(true, |cutoff| t >= cutoff))
            })
            .max_by_key(|s| s.latest_current_at)
            .map(|s| s.record.clone()))
    }

    async fn find_by_city_name(&self, name: &str) -> WeatherResult<Option<WeatherRecord>> {
        self.check()?;
        let records = self.records.lock().await;
        Ok(records
            .values()
            .filter(|s| s.record.city_name.as_deref() == Some(name))
            .max_by_key(|s| s.record.updated_at)
            .map(|s| s.record.clone()))
    }

    async fn latest_historical_timestamp(
        &self,
        identity: &RecordIdentity,
    ) -> WeatherResult<Option<DateTime<Utc>>> {
        self.check()?;
        let records = self.records.lock().await;
        Ok(records
            .get(&identity.record_key())
            .and_then(|s| s.historical_until))
    }

    async fn delete_all(&self) -> WeatherResult<u64> {
        self.check()?;
        let mut records = self.records.lock().await;
        let count = records.len() as u64;
        records.clear();
        Ok(count)
    }

    async fn ping(&self) -> WeatherResult<()> {
        self.check()
    }
}

// ============================================================================
// Fast cache
// ============================================================================

struct CachedValue {
    value: String,
    /// `None` when the TTL overflows `Instant`.
    expires_at: Option<Instant>,
}

impl CachedValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

struct CacheInner {
    values: HashMap<String, CachedValue>,
    recency: LruCache<String, ()>,
}

/// In-memory [`FastCache`] with lazy TTL expiry.
pub struct MemoryFastCache {
    inner: Mutex<CacheInner>,
    unavailable: AtomicBool,
}

impl MemoryFastCache {
    pub fn new(limit: usize) -> Self {
        let capacity = NonZeroUsize::new(limit).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                values: HashMap::new(),
                recency: LruCache::new(capacity),
            }),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Whether a value is held for `key`, ignoring availability.
    pub async fn contains(&self, key: &str) -> bool {
        let inner = self.inner.lock().await;
        inner
            .values
            .get(key)
            .is_some_and(|v| v.is_live(Instant::now()))
    }

    fn check(&self) -> WeatherResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(WeatherError::StoreUnavailable(
                "memory cache marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl FastCache for MemoryFastCache {
    async fn get(&self, key: &str) -> WeatherResult<Option<String>> {
        self.check()?;
        let mut inner = self.inner.lock().await;

        let expired = match inner.values.get(key) {
            Some(v) if v.is_live(Instant::now()) => return Ok(Some(v.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.values.remove(key);
        }

        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> WeatherResult<()> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        inner.values.insert(
            key.to_string(),
            CachedValue {
                value: value.to_string(),
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        Ok(())
    }

    async fn touch(&self, key: &str) -> WeatherResult<Option<String>> {
        self.check()?;
        let mut inner = self.inner.lock().await;

        // push returns the old entry for an existing key, or the LRU entry it displaced
        match inner.recency.push(key.to_string(), ()) {
            Some((evicted, _)) if evicted != key => {
                inner.values.remove(&evicted);
                Ok(Some(evicted))
            }
            _ => Ok(None),
        }
    }

    async fn evict(&self, key: &str) -> WeatherResult<()> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        inner.values.remove(key);
        inner.recency.pop(key);
        Ok(())
    }

    async fn recent(&self) -> WeatherResult<Vec<String>> {
        self.check()?;
        let inner = self.inner.lock().await;
        Ok(inner.recency.iter().map(|(k, _)| k.clone()).collect())
    }

    async fn clear(&self) -> WeatherResult<u64> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        let count = inner.values.len() as u64;
        inner.values.clear();
        inner.recency.clear();
        Ok(count)
    }

    async fn ping(&self) -> WeatherResult<()> {
        self.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_touch_existing_key_moves_without_evicting() {
        let cache = MemoryFastCache::new(2);
        cache.touch("A").await.unwrap();
        cache.touch("B").await.unwrap();

        assert_eq!(cache.touch("A").await.unwrap(), None);
        assert_eq!(cache.recent().await.unwrap(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_value_expires() {
        let cache = MemoryFastCache::new(2);
        cache
            .set_with_ttl("A", "{}", Duration::from_millis(0))
            .await
            .unwrap();
        assert_eq!(cache.get("A").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = MemoryWeatherStore::new();
        store.set_available(false);
        let err = store.delete_all().await.unwrap_err();
        assert!(matches!(err, WeatherError::StoreUnavailable(_)));

        store.set_available(true);
        assert_eq!(store.delete_all().await.unwrap(), 0);
    }
}
