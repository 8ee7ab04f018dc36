//! Storage abstractions for the weather cache services.
//!
//! Provides unified interfaces for:
//! - PostgreSQL for durable per-city weather records
//! - Redis for the bounded fast cache
//! - In-memory implementations of both, for tests and local runs

pub mod cache;
pub mod memory;
pub mod store;

pub use cache::{FastCache, RedisFastCache, RECENT_LIST_KEY, VALUE_KEY_PREFIX};
pub use memory::{MemoryFastCache, MemoryWeatherStore};
pub use store::{PgWeatherStore, WeatherStore};
