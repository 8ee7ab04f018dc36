//! Tests against a live PostgreSQL. Skipped unless `TEST_DATABASE_URL` is set.

use std::sync::Arc;
use std::time::Duration;

use storage::{PgWeatherStore, WeatherStore};
use test_utils::{points, reading_ago, require_env};
use weather_common::{Coordinate, RecordIdentity};

#[tokio::test]
async fn test_postgres_upsert_append_and_freshness() {
    let url = require_env!("TEST_DATABASE_URL");
    let store = Arc::new(PgWeatherStore::connect(&url, 5).await.unwrap());
    store.migrate().await.unwrap();
    store.delete_all().await.unwrap();

    let coordinate = Coordinate::new(points::SILAO.0, points::SILAO.1).unwrap();
    let identity = RecordIdentity::City {
        id: 3983058,
        name: "Silao".to_string(),
        coordinate,
    };

    // Concurrent prepends are both retained.
    let a = {
        let (store, identity) = (store.clone(), identity.clone());
        tokio::spawn(async move {
            store
                .upsert_current_reading(&identity, &reading_ago(30, 18.0))
                .await
        })
    };
    let b = {
        let (store, identity) = (store.clone(), identity.clone());
        tokio::spawn(async move {
            store
                .upsert_current_reading(&identity, &reading_ago(20, 19.0))
                .await
        })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let record = store
        .upsert_current_reading(&identity, &reading_ago(0, 20.0))
        .await
        .unwrap();
    assert_eq!(record.current_readings.len(), 3);
    assert_eq!(record.current_readings[0].temperature, Some(20.0));
    assert!(record.historical_data.is_empty());

    store
        .append_historical_readings(&identity, &[reading_ago(7200, 10.0), reading_ago(3600, 11.0)])
        .await
        .unwrap();
    let by_name = store.find_by_city_name("Silao").await.unwrap().unwrap();
    assert_eq!(by_name.historical_data.len(), 2);
    assert!(store
        .latest_historical_timestamp(&identity)
        .await
        .unwrap()
        .is_some());

    let fresh = store
        .find_fresh_current(&coordinate, Duration::from_secs(3600))
        .await
        .unwrap();
    assert_eq!(fresh.map(|r| r.record_key), Some("3983058".to_string()));

    assert_eq!(store.delete_all().await.unwrap(), 1);
}
