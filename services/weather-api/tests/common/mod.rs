//! Shared harness: the full service wired over in-memory adapters.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use storage::{MemoryFastCache, MemoryWeatherStore};
use test_utils::ScriptedProvider;
use weather_api::config::ServiceConfig;
use weather_api::state::{Adapters, AppState};
use weather_common::CityCatalog;

pub struct Harness {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryWeatherStore>,
    pub cache: Arc<MemoryFastCache>,
    pub provider: Arc<ScriptedProvider>,
}

pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        backfill_delay: Duration::ZERO,
        ..ServiceConfig::default()
    }
}

pub fn harness(provider: ScriptedProvider) -> Harness {
    harness_with(provider, test_config(), CityCatalog::builtin())
}

pub fn harness_with(
    provider: ScriptedProvider,
    config: ServiceConfig,
    catalog: CityCatalog,
) -> Harness {
    let store = Arc::new(MemoryWeatherStore::new());
    let cache = Arc::new(MemoryFastCache::new(config.cache.cache_limit));
    let provider = Arc::new(provider);

    let state = AppState::build(
        &config,
        catalog,
        Adapters {
            store: store.clone(),
            cache: cache.clone(),
            provider: provider.clone(),
        },
    );

    Harness {
        state: Arc::new(state),
        store,
        cache,
        provider,
    }
}
