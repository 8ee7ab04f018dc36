//! Background worker for the historical backfill.
//!
//! Triggers enqueue a job and return immediately. The worker walks the city
//! table one city at a time, pausing between cities, and publishes progress
//! on a `watch` channel. A failing city is recorded and skipped; it never
//! stops the batch. Jobs queued while one is running run after it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use weather_common::CityCatalog;

use crate::history::HistoryImporter;
use crate::metrics;

/// Maximum jobs waiting behind the running one.
pub const QUEUE_DEPTH: usize = 4;

/// Why a trigger was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackfillError {
    #[error("Backfill queue is full ({0} jobs waiting)")]
    QueueFull(usize),

    #[error("Backfill worker is not running")]
    WorkerStopped,
}

impl BackfillError {
    pub fn code(&self) -> &'static str {
        match self {
            BackfillError::QueueFull(_) => "backfill_queue_full",
            BackfillError::WorkerStopped => "backfill_stopped",
        }
    }
}

#[derive(Debug, Clone)]
struct BackfillJob {
    id: Uuid,
    requested_at: DateTime<Utc>,
}

/// Response to a trigger.
#[derive(Debug, Clone, Serialize)]
pub struct BackfillTicket {
    pub accepted: bool,
    pub job_id: Uuid,
}

/// Progress of the running job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackfillProgress {
    pub job_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub current_city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityFailure {
    pub city_id: u64,
    pub city: String,
    pub code: String,
    pub error: String,
}

/// Outcome of a finished job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackfillReport {
    pub job_id: Uuid,
    pub requested_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: Vec<String>,
    pub failures: Vec<CityFailure>,
    pub readings_appended: u64,
    /// True if shutdown stopped the job before every city was visited.
    pub interrupted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BackfillStatus {
    Idle,
    Running(BackfillProgress),
    Finished(BackfillReport),
}

/// Cloneable handle for triggering jobs and reading status.
#[derive(Clone)]
pub struct BackfillHandle {
    jobs: mpsc::Sender<BackfillJob>,
    status: watch::Receiver<BackfillStatus>,
}

impl BackfillHandle {
    /// Enqueue a backfill job without waiting for any of it to run.
    pub fn trigger(&self) -> Result<BackfillTicket, BackfillError> {
        let job = BackfillJob {
            id: Uuid::new_v4(),
            requested_at: Utc::now(),
        };
        let job_id = job.id;

        self.jobs.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => BackfillError::QueueFull(QUEUE_DEPTH),
            mpsc::error::TrySendError::Closed(_) => BackfillError::WorkerStopped,
        })?;

        info!(job_id = %job_id, "Backfill job queued");
        Ok(BackfillTicket {
            accepted: true,
            job_id,
        })
    }

    pub fn status(&self) -> BackfillStatus {
        self.status.borrow().clone()
    }

    /// Receiver for awaiting status changes.
    pub fn subscribe(&self) -> watch::Receiver<BackfillStatus> {
        self.status.clone()
    }
}

/// The worker task's owned state.
pub struct BackfillWorker {
    catalog: Arc<CityCatalog>,
    importer: Arc<HistoryImporter>,
    delay: Duration,
}

impl BackfillWorker {
    pub fn new(catalog: Arc<CityCatalog>, importer: Arc<HistoryImporter>, delay: Duration) -> Self {
        Self {
            catalog,
            importer,
            delay,
        }
    }

    /// Start the worker. It exits when `shutdown` fires or every handle is dropped.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> (BackfillHandle, JoinHandle<()>) {
        let (jobs_tx, jobs_rx) = mpsc::channel(QUEUE_DEPTH);
        let (status_tx, status_rx) = watch::channel(BackfillStatus::Idle);

        let task = tokio::spawn(self.run(jobs_rx, status_tx, shutdown));

        (
            BackfillHandle {
                jobs: jobs_tx,
                status: status_rx,
            },
            task,
        )
    }

    async fn run(
        self,
        mut jobs: mpsc::Receiver<BackfillJob>,
        status: watch::Sender<BackfillStatus>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down backfill worker");
                    break;
                }
                job = jobs.recv() => {
                    let Some(job) = job else { break };
                    let report = self.run_job(job, &status, &mut shutdown).await;
                    let interrupted = report.interrupted;
                    status.send_replace(BackfillStatus::Finished(report));
                    if interrupted {
                        info!("Backfill interrupted by shutdown");
                        break;
                    }
                }
            }
        }
    }

    async fn run_job(
        &self,
        job: BackfillJob,
        status: &watch::Sender<BackfillStatus>,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> BackfillReport {
        let cities = self.catalog.cities();
        let started_at = Utc::now();
        let mut progress = BackfillProgress {
            job_id: job.id,
            started_at,
            total: cities.len(),
            completed: 0,
            failed: 0,
            current_city: None,
        };
        let mut succeeded = Vec::new();
        let mut failures = Vec::new();
        let mut readings_appended = 0u64;
        let mut interrupted = false;

        info!(job_id = %job.id, cities = cities.len(), "Starting historical backfill");
        status.send_replace(BackfillStatus::Running(progress.clone()));

        for (i, city) in cities.iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::select! {
                    _ = shutdown.recv() => {
                        interrupted = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }

            progress.current_city = Some(city.name.clone());
            status.send_replace(BackfillStatus::Running(progress.clone()));

            match self.importer.import(city).await {
                Ok(appended) => {
                    info!(city = %city.name, appended, "Imported city history");
                    readings_appended += appended as u64;
                    succeeded.push(city.name.clone());
                    metrics::record_backfill_city("success");
                }
                Err(e) => {
                    warn!(city = %city.name, error = %e, "City history import failed");
                    failures.push(CityFailure {
                        city_id: city.id,
                        city: city.name.clone(),
                        code: e.code().to_string(),
                        error: e.to_string(),
                    });
                    progress.failed += 1;
                    metrics::record_backfill_city("failure");
                }
            }

            progress.completed += 1;
            status.send_replace(BackfillStatus::Running(progress.clone()));
        }

        info!(
            job_id = %job.id,
            success = succeeded.len(),
            failed = failures.len(),
            "Backfill complete"
        );

        BackfillReport {
            job_id: job.id,
            requested_at: job.requested_at,
            started_at,
            finished_at: Utc::now(),
            total: cities.len(),
            succeeded,
            failures,
            readings_appended,
            interrupted,
        }
    }
}
