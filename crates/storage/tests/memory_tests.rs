//! Behavioural tests for the in-memory store and cache.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

use storage::{FastCache, MemoryFastCache, MemoryWeatherStore, WeatherStore};
use weather_common::{CityCatalog, Coordinate, RecordIdentity, WeatherReading};

fn celaya() -> RecordIdentity {
    let catalog = CityCatalog::builtin();
    RecordIdentity::from(catalog.find_by_name("Celaya").unwrap())
}

fn reading_at(secs_ago: i64, temperature: f64) -> WeatherReading {
    WeatherReading::new(
        Utc::now() - ChronoDuration::seconds(secs_ago),
        Some(temperature),
        Some(812.0),
    )
}

// ============================================================================
// Durable store
// ============================================================================

#[tokio::test]
async fn test_sequential_upserts_keep_both_newest_first() {
    let store = MemoryWeatherStore::new();
    let identity = celaya();

    store
        .upsert_current_reading(&identity, &reading_at(120, 18.0))
        .await
        .unwrap();
    let record = store
        .upsert_current_reading(&identity, &reading_at(10, 19.5))
        .await
        .unwrap();

    assert_eq!(record.current_readings.len(), 2);
    assert_eq!(record.current_readings[0].temperature, Some(19.5));
    assert_eq!(record.current_readings[1].temperature, Some(18.0));
    assert!(record.historical_data.is_empty());
    assert_eq!(record.record_key, "4014875");
}

#[tokio::test]
async fn test_concurrent_upserts_are_all_retained() {
    let store = Arc::new(MemoryWeatherStore::new());
    let identity = celaya();

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            let identity = identity.clone();
            tokio::spawn(async move {
                store
                    .upsert_current_reading(&identity, &reading_at(i, i as f64))
                    .await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let record = store.get("4014875").await.unwrap();
    assert_eq!(record.current_readings.len(), 8);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_freshness_boundary() {
    let max_age = Duration::from_secs(3600);
    let identity = celaya();
    let coordinate = *identity.coordinate();

    let fresh = MemoryWeatherStore::new();
    fresh
        .upsert_current_reading(&identity, &reading_at(3599, 20.0))
        .await
        .unwrap();
    assert!(fresh
        .find_fresh_current(&coordinate, max_age)
        .await
        .unwrap()
        .is_some());

    let stale = MemoryWeatherStore::new();
    stale
        .upsert_current_reading(&identity, &reading_at(3601, 20.0))
        .await
        .unwrap();
    assert!(stale
        .find_fresh_current(&coordinate, max_age)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_find_fresh_current_matches_normalized_coordinate() {
    let store = MemoryWeatherStore::new();
    let point = Coordinate::new(20.5058, -101.53802).unwrap();
    let identity = RecordIdentity::Unaffiliated(point);

    store
        .upsert_current_reading(&identity, &reading_at(5, 21.0))
        .await
        .unwrap();

    let noisy = Coordinate::new(20.50580000004, -101.53802).unwrap();
    let record = store
        .find_fresh_current(&noisy, Duration::from_secs(3600))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.city_id, None);
    assert_eq!(record.record_key, "coord:20.505800,-101.538020");
}

#[tokio::test]
async fn test_historical_append_and_lookup_by_name() {
    let store = MemoryWeatherStore::new();
    let identity = celaya();

    store
        .append_historical_readings(&identity, &[reading_at(7200, 15.0), reading_at(3600, 16.0)])
        .await
        .unwrap();
    store
        .append_historical_readings(&identity, &[reading_at(7200, 15.0)])
        .await
        .unwrap();

    let record = store.find_by_city_name("Celaya").await.unwrap().unwrap();
    assert_eq!(record.historical_data.len(), 3);
    assert_eq!(record.historical_data[1].temperature, Some(16.0));
    assert!(record.current_readings.is_empty());

    let until = store
        .latest_historical_timestamp(&identity)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(until, record.historical_data[1].timestamp);

    assert!(store.find_by_city_name("Silao").await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_all_counts_records() {
    let store = MemoryWeatherStore::new();
    store
        .upsert_current_reading(&celaya(), &reading_at(0, 1.0))
        .await
        .unwrap();
    store
        .upsert_current_reading(
            &RecordIdentity::Unaffiliated(Coordinate::new(1.0, 1.0).unwrap()),
            &reading_at(0, 1.0),
        )
        .await
        .unwrap();

    assert_eq!(store.delete_all().await.unwrap(), 2);
    assert!(store.is_empty().await);
}

// ============================================================================
// Fast cache
// ============================================================================

#[tokio::test]
async fn test_lru_eviction_is_exact() {
    let cache = MemoryFastCache::new(2);
    let ttl = Duration::from_secs(60);

    for key in ["A", "B", "C"] {
        cache.set_with_ttl(key, "{}", ttl).await.unwrap();
    }

    assert_eq!(cache.touch("A").await.unwrap(), None);
    assert_eq!(cache.touch("B").await.unwrap(), None);
    assert_eq!(cache.touch("C").await.unwrap(), Some("A".to_string()));

    assert_eq!(cache.recent().await.unwrap(), vec!["C", "B"]);
    assert_eq!(cache.get("A").await.unwrap(), None);
    assert!(cache.get("B").await.unwrap().is_some());
    assert!(cache.get("C").await.unwrap().is_some());
}

#[tokio::test]
async fn test_evict_and_clear() {
    let cache = MemoryFastCache::new(3);
    let ttl = Duration::from_secs(60);

    for key in ["A", "B"] {
        cache.set_with_ttl(key, "{}", ttl).await.unwrap();
        cache.touch(key).await.unwrap();
    }

    cache.evict("A").await.unwrap();
    assert_eq!(cache.recent().await.unwrap(), vec!["B"]);
    assert!(!cache.contains("A").await);

    assert_eq!(cache.clear().await.unwrap(), 1);
    assert!(cache.recent().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unbounded_windows_do_not_overflow() {
    let store = MemoryWeatherStore::new();
    let identity = celaya();
    store
        .upsert_current_reading(&identity, &reading_at(86_400, 15.0))
        .await
        .unwrap();

    let huge = Duration::from_secs(1_000_000_000_000_000);
    let found = store
        .find_fresh_current(identity.coordinate(), huge)
        .await
        .unwrap();
    assert!(found.is_some());

    let cache = MemoryFastCache::new(2);
    cache.set_with_ttl("Celaya", "{}", Duration::MAX).await.unwrap();
    assert_eq!(cache.get("Celaya").await.unwrap().as_deref(), Some("{}"));
}
