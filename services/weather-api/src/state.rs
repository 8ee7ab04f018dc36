//! Application state for the weather API.

use std::sync::Arc;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use storage::{FastCache, PgWeatherStore, RedisFastCache, WeatherStore};
use weather_client::{OpenMeteoClient, WeatherProvider};
use weather_common::CityCatalog;

use crate::backfill::BackfillWorker;
use crate::config::ServiceConfig;
use crate::history::HistoryImporter;
use crate::orchestrator::WeatherService;

/// External collaborators, constructed once and shared.
pub struct Adapters {
    pub store: Arc<dyn WeatherStore>,
    pub cache: Arc<dyn FastCache>,
    pub provider: Arc<dyn WeatherProvider>,
}

/// Shared application state.
pub struct AppState {
    pub service: WeatherService,

    /// Kept for readiness checks.
    pub store: Arc<dyn WeatherStore>,
    pub cache: Arc<dyn FastCache>,

    /// Renders `/metrics`; absent when no recorder is installed.
    pub prometheus: Option<PrometheusHandle>,

    shutdown: broadcast::Sender<()>,
    backfill_task: Mutex<Option<JoinHandle<()>>>,
}

impl AppState {
    /// Connect to PostgreSQL and Redis, run migrations, and start the backfill worker.
    pub async fn connect(config: &ServiceConfig) -> Result<Self> {
        let store = PgWeatherStore::connect(&config.database_url, config.database_max_connections)
            .await
            .context("Failed to connect to PostgreSQL")?;
        store
            .migrate()
            .await
            .context("Failed to run database migrations")?;
        info!("Durable store ready");

        let cache = RedisFastCache::connect(&config.redis_url, config.cache.cache_limit)
            .await
            .context("Failed to connect to Redis")?;
        info!(limit = cache.limit(), "Fast cache ready");

        let provider = OpenMeteoClient::new(config.upstream.clone())
            .context("Failed to build upstream HTTP client")?;

        Ok(Self::build(
            config,
            CityCatalog::builtin(),
            Adapters {
                store: Arc::new(store),
                cache: Arc::new(cache),
                provider: Arc::new(provider),
            },
        ))
    }

    /// Wire the orchestrator and backfill worker over the given adapters.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(config: &ServiceConfig, catalog: CityCatalog, adapters: Adapters) -> Self {
        let catalog = Arc::new(catalog);
        let importer = Arc::new(HistoryImporter::new(
            adapters.store.clone(),
            adapters.cache.clone(),
            adapters.provider.clone(),
            config.history,
            config.history_dedupe,
        ));

        let (shutdown, _) = broadcast::channel(1);
        let (backfill, task) = BackfillWorker::new(catalog.clone(), importer.clone(), config.backfill_delay)
            .spawn(shutdown.subscribe());

        let service = WeatherService::new(
            catalog,
            adapters.store.clone(),
            adapters.cache.clone(),
            adapters.provider,
            importer,
            backfill,
            config.cache.clone(),
        );

        Self {
            service,
            store: adapters.store,
            cache: adapters.cache,
            prometheus: None,
            shutdown,
            backfill_task: Mutex::new(Some(task)),
        }
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    /// Stop the backfill worker and wait for it to exit.
    pub async fn shutdown(&self) {
        self.shutdown.send(()).ok();

        if let Some(task) = self.backfill_task.lock().await.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Backfill worker ended abnormally");
            }
        }
    }
}
