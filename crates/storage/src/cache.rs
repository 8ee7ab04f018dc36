//! Redis-based fast cache with a bounded recency list.

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client, Script};
use std::time::Duration;
use tracing::{debug, instrument};

use weather_common::{WeatherError, WeatherResult};

/// Prefix for value keys.
pub const VALUE_KEY_PREFIX: &str = "weather:city:";

/// List of recently touched keys, most recent first.
pub const RECENT_LIST_KEY: &str = "weather:recent";

/// Key/value cache with TTL plus an LRU recency list of bounded length.
///
/// The recency list never holds duplicates. When a touch grows it past the
/// limit, exactly the least-recently-touched key is dropped from the list
/// and its value is deleted.
#[async_trait]
pub trait FastCache: Send + Sync {
    async fn get(&self, key: &str) -> WeatherResult<Option<String>>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> WeatherResult<()>;

    /// Move `key` to the front of the recency list, returning the evicted key if any.
    async fn touch(&self, key: &str) -> WeatherResult<Option<String>>;

    /// Remove a key's value and its recency entry.
    async fn evict(&self, key: &str) -> WeatherResult<()>;

    /// Recency list, most recent first.
    async fn recent(&self) -> WeatherResult<Vec<String>>;

    /// Drop every cached value and the recency list, returning the number of values removed.
    async fn clear(&self) -> WeatherResult<u64>;

    async fn ping(&self) -> WeatherResult<()>;
}

// Atomic: LREM, LPUSH, then RPOP and DEL of the evicted value when over the limit.
const TOUCH_SCRIPT: &str = r#"
redis.call('LREM', KEYS[1], 0, ARGV[1])
redis.call('LPUSH', KEYS[1], ARGV[1])
if redis.call('LLEN', KEYS[1]) > tonumber(ARGV[2]) then
    local evicted = redis.call('RPOP', KEYS[1])
    redis.call('DEL', ARGV[3] .. evicted)
    return evicted
end
return false
"#;

/// Redis fast cache client.
pub struct RedisFastCache {
    conn: MultiplexedConnection,
    limit: usize,
    touch_script: Script,
}

impl RedisFastCache {
    /// Connect to Redis.
    pub async fn connect(redis_url: &str, limit: usize) -> WeatherResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| WeatherError::StoreUnavailable(format!("Redis connection failed: {}", e)))?;

        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| WeatherError::StoreUnavailable(format!("Redis connection failed: {}", e)))?;

        Ok(Self {
            conn,
            limit: limit.max(1),
            touch_script: Script::new(TOUCH_SCRIPT),
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

fn value_key(key: &str) -> String {
    format!("{}{}", VALUE_KEY_PREFIX, key)
}

fn cache_error(op: &str, e: redis::RedisError) -> WeatherError {
    WeatherError::StoreUnavailable(format!("Cache {} failed: {}", op, e))
}

#[async_trait]
impl FastCache for RedisFastCache {
    async fn get(&self, key: &str) -> WeatherResult<Option<String>> {
        let mut conn = self.conn.clone();

        conn.get(value_key(key))
            .await
            .map_err(|e| cache_error("get", e))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> WeatherResult<()> {
        let mut conn = self.conn.clone();

        let _: () = conn
            .set_ex(value_key(key), value, ttl.as_secs().max(1))
            .await
            .map_err(|e| cache_error("set", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn touch(&self, key: &str) -> WeatherResult<Option<String>> {
        let mut conn = self.conn.clone();

        let evicted: Option<String> = self
            .touch_script
            .key(RECENT_LIST_KEY)
            .arg(key)
            .arg(self.limit)
            .arg(VALUE_KEY_PREFIX)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| cache_error("touch", e))?;

        if let Some(evicted) = &evicted {
            debug!(evicted = %evicted, "Recency list over limit");
        }

        Ok(evicted)
    }

    async fn evict(&self, key: &str) -> WeatherResult<()> {
        let mut conn = self.conn.clone();

        let _: () = redis::pipe()
            .atomic()
            .del(value_key(key))
            .ignore()
            .lrem(RECENT_LIST_KEY, 0, key)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| cache_error("evict", e))?;

        Ok(())
    }

    async fn recent(&self) -> WeatherResult<Vec<String>> {
        let mut conn = self.conn.clone();

        conn.lrange(RECENT_LIST_KEY, 0, -1)
            .await
            .map_err(|e| cache_error("recent", e))
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> WeatherResult<u64> {
        let mut conn = self.conn.clone();

        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(format!("{}*", VALUE_KEY_PREFIX))
            .query_async(&mut conn)
            .await
            .map_err(|e| cache_error("pattern search", e))?;

        let count = keys.len() as u64;

        for key in keys {
            let _: () = conn.del(&key).await.map_err(|e| cache_error("delete", e))?;
        }

        let _: () = conn
            .del(RECENT_LIST_KEY)
            .await
            .map_err(|e| cache_error("delete", e))?;

        Ok(count)
    }

    async fn ping(&self) -> WeatherResult<()> {
        let mut conn = self.conn.clone();

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| cache_error("ping", e))?;

        Ok(())
    }
}
