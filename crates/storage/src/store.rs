//! Durable weather records using PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use std::time::Duration;
use tracing::{debug, instrument};

use weather_common::{
    Coordinate, RecordIdentity, WeatherError, WeatherReading, WeatherRecord, WeatherResult,
};

/// Durable, city-keyed weather records.
///
/// Every write is a single atomic create-if-absent plus append, so concurrent
/// writers for the same record never lose each other's readings.
#[async_trait]
pub trait WeatherStore: Send + Sync {
    /// Prepend a current reading, creating the record (with empty history) if absent.
    async fn upsert_current_reading(
        &self,
        identity: &RecordIdentity,
        reading: &WeatherReading,
    ) -> WeatherResult<WeatherRecord>;

    /// Append historical readings in order, creating the record if absent.
    async fn append_historical_readings(
        &self,
        identity: &RecordIdentity,
        readings: &[WeatherReading],
    ) -> WeatherResult<()>;

    /// Record at this coordinate whose newest current reading is within `max_age`.
    async fn find_fresh_current(
        &self,
        coordinate: &Coordinate,
        max_age: Duration,
    ) -> WeatherResult<Option<WeatherRecord>>;

    async fn find_by_city_name(&self, name: &str) -> WeatherResult<Option<WeatherRecord>>;

    /// Timestamp of the newest stored historical reading for a record.
    async fn latest_historical_timestamp(
        &self,
        identity: &RecordIdentity,
    ) -> WeatherResult<Option<DateTime<Utc>>>;

    /// Delete every record, returning how many were removed.
    async fn delete_all(&self) -> WeatherResult<u64>;

    async fn ping(&self) -> WeatherResult<()>;
}

/// PostgreSQL connection pool and record operations.
pub struct PgWeatherStore {
    pool: PgPool,
}

impl PgWeatherStore {
    /// Create a new store connection from database URL.
    pub async fn connect(database_url: &str, max_connections: u32) -> WeatherResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| WeatherError::StoreUnavailable(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    /// Create the table and indexes.
    pub async fn migrate(&self) -> WeatherResult<()> {
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| {
                        WeatherError::StoreUnavailable(format!("Migration failed: {}", e))
                    })?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl WeatherStore for PgWeatherStore {
    #[instrument(skip(self, reading), fields(record_key = %identity.record_key()))]
    async fn upsert_current_reading(
        &self,
        identity: &RecordIdentity,
        reading: &WeatherReading,
    ) -> WeatherResult<WeatherRecord> {
        let coordinate = identity.coordinate();

        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            INSERT INTO weather_records (
                record_key, city_id, city_name, coord_key, latitude, longitude,
                current_readings, historical_data, latest_current_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6,
                $7, '[]'::jsonb, $8, NOW()
            )
            ON CONFLICT (record_key)
            DO UPDATE SET
                current_readings = EXCLUDED.current_readings || weather_records.current_readings,
                latest_current_at = GREATEST(weather_records.latest_current_at, EXCLUDED.latest_current_at),
                updated_at = NOW()
            RETURNING record_key, city_id, city_name, latitude, longitude,
                      current_readings, historical_data, updated_at
            "#,
        )
        .bind(identity.record_key())
        .bind(identity.city_id().map(|id| id as i64))
        .bind(identity.city_name())
        .bind(coordinate.key().as_str())
        .bind(coordinate.latitude)
        .bind(coordinate.longitude)
        .bind(Json(vec![reading.clone()]))
        .bind(reading.timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| WeatherError::StoreUnavailable(format!("Upsert failed: {}", e)))?;

        Ok(row.into())
    }

    #[instrument(skip(self, readings), fields(record_key = %identity.record_key(), count = readings.len()))]
    async fn append_historical_readings(
        &self,
        identity: &RecordIdentity,
        readings: &[WeatherReading],
    ) -> WeatherResult<()> {
        let coordinate = identity.coordinate();
        let until = readings.iter().map(|r| r.timestamp).max();

        sqlx::query(
            r#"
            INSERT INTO weather_records (
                record_key, city_id, city_name, coord_key, latitude, longitude,
                current_readings, historical_data, historical_until, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6,
                '[]'::jsonb, $7, $8, NOW()
            )
            ON CONFLICT (record_key)
            DO UPDATE SET
                historical_data = weather_records.historical_data || EXCLUDED.historical_data,
                historical_until = GREATEST(weather_records.historical_until, EXCLUDED.historical_until),
                updated_at = NOW()
            "#,
        )
        .bind(identity.record_key())
        .bind(identity.city_id().map(|id| id as i64))
        .bind(identity.city_name())
        .bind(coordinate.key().as_str())
        .bind(coordinate.latitude)
        .bind(coordinate.longitude)
        .bind(Json(readings))
        .bind(until)
        .execute(&self.pool)
        .await
        .map_err(|e| WeatherError::StoreUnavailable(format!("Append failed: {}", e)))?;

        debug!("Appended historical readings");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_fresh_current(
        &self,
        coordinate: &Coordinate,
        max_age: Duration,
    ) -> WeatherResult<Option<WeatherRecord>> {
        let max_age = chrono::Duration::from_std(max_age)
            .map_err(|e| WeatherError::InvalidInput(format!("Invalid max age: {}", e)))?;
        // No cutoff when the window reaches past the representable range.
        let cutoff = Utc::now().checked_sub_signed(max_age);

        let row = sqlx::query_as::<_, RecordRow>(
            "SELECT record_key, city_id, city_name, latitude, longitude, \
             current_readings, historical_data, updated_at FROM weather_records \
             WHERE coord_key = $1 AND latest_current_at IS NOT NULL \
             AND ($2::timestamptz IS NULL OR latest_current_at >= $2) \
             ORDER BY latest_current_at DESC LIMIT 1",
        )
        .bind(coordinate.key().as_str())
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| WeatherError::StoreUnavailable(format!("Query failed: {}", e)))?;

        Ok(row.map(|r| r.into()))
    }

    #[instrument(skip(self))]
    async fn find_by_city_name(&self, name: &str) -> WeatherResult<Option<WeatherRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(
            "SELECT record_key, city_id, city_name, latitude, longitude, \
             current_readings, historical_data, updated_at FROM weather_records \
             WHERE city_name = $1 ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| WeatherError::StoreUnavailable(format!("Query failed: {}", e)))?;

        Ok(row.map(|r| r.into()))
    }

    async fn latest_historical_timestamp(
        &self,
        identity: &RecordIdentity,
    ) -> WeatherResult<Option<DateTime<Utc>>> {
        let until: Option<Option<DateTime<Utc>>> = sqlx::query_scalar(
            "SELECT historical_until FROM weather_records WHERE record_key = $1",
        )
        .bind(identity.record_key())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| WeatherError::StoreUnavailable(format!("Query failed: {}", e)))?;

        Ok(until.flatten())
    }

    #[instrument(skip(self))]
    async fn delete_all(&self) -> WeatherResult<u64> {
        let result = sqlx::query("DELETE FROM weather_records")
            .execute(&self.pool)
            .await
            .map_err(|e| WeatherError::StoreUnavailable(format!("Delete failed: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> WeatherResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| WeatherError::StoreUnavailable(format!("Ping failed: {}", e)))?;

        Ok(())
    }
}

// Internal row type for SQLx
#[derive(FromRow)]
struct RecordRow {
    record_key: String,
    city_id: Option<i64>,
    city_name: Option<String>,
    latitude: f64,
    longitude: f64,
    current_readings: Json<Vec<WeatherReading>>,
    historical_data: Json<Vec<WeatherReading>>,
    updated_at: DateTime<Utc>,
}

impl From<RecordRow> for WeatherRecord {
    fn from(row: RecordRow) -> Self {
        WeatherRecord {
            record_key: row.record_key,
            city_id: row.city_id.map(|id| id as u64),
            city_name: row.city_name,
            latitude: row.latitude,
            longitude: row.longitude,
            current_readings: row.current_readings.0,
            historical_data: row.historical_data.0,
            updated_at: row.updated_at,
        }
    }
}

/// Database schema SQL.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS weather_records (
    record_key TEXT PRIMARY KEY,
    city_id BIGINT,
    city_name TEXT,
    coord_key TEXT NOT NULL,
    latitude DOUBLE PRECISION NOT NULL,
    longitude DOUBLE PRECISION NOT NULL,
    current_readings JSONB NOT NULL DEFAULT '[]'::jsonb,
    historical_data JSONB NOT NULL DEFAULT '[]'::jsonb,
    latest_current_at TIMESTAMPTZ,
    historical_until TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_weather_records_city_latest ON weather_records(city_id, latest_current_at DESC);
CREATE INDEX IF NOT EXISTS idx_weather_records_coord ON weather_records(coord_key, latest_current_at DESC);
CREATE INDEX IF NOT EXISTS idx_weather_records_city_name ON weather_records(city_name)
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_split_cleanly() {
        let statements: Vec<&str> = SCHEMA_SQL
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        assert_eq!(statements.len(), 4);
        assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS weather_records"));
        assert!(statements.iter().skip(1).all(|s| s.starts_with("CREATE INDEX")));
    }

    #[test]
    fn test_row_conversion() {
        let row = RecordRow {
            record_key: "4014875".into(),
            city_id: Some(4014875),
            city_name: Some("Celaya".into()),
            latitude: 20.51667,
            longitude: -100.816673,
            current_readings: Json(vec![]),
            historical_data: Json(vec![]),
            updated_at: Utc::now(),
        };

        let record: WeatherRecord = row.into();
        assert_eq!(record.city_id, Some(4014875));
        assert_eq!(record.city_name.as_deref(), Some("Celaya"));
    }
}
