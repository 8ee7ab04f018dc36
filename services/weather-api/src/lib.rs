//! Weather proxy cache service.
//!
//! Answers point weather queries from a bounded fast cache, then the durable
//! store, then the upstream provider, writing back down the chain. Historical
//! series for the known cities are imported by a background backfill worker.

pub mod backfill;
pub mod config;
pub mod handlers;
pub mod history;
pub mod metrics;
pub mod orchestrator;
pub mod state;

pub use handlers::build_router;
pub use state::AppState;
