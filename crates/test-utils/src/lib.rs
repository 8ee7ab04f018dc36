//! Shared test utilities for the weather cache workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Skip macro for tests that need live services
//! - A scripted [`WeatherProvider`](weather_client::WeatherProvider) fake
//! - Common test fixtures
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../../crates/test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, ScriptedProvider};
//! ```

pub mod fixtures;
pub mod provider;

pub use fixtures::*;
pub use provider::{Failure, ScriptedProvider};

/// Macro to skip a test if an environment variable is not set.
///
/// # Usage
///
/// ```ignore
/// use test_utils::require_env;
///
/// #[tokio::test]
/// async fn test_against_redis() {
///     let url = require_env!("TEST_REDIS_URL");
///     // Test code using url...
/// }
/// ```
#[macro_export]
macro_rules! require_env {
    ($name:expr) => {{
        match std::env::var($name) {
            Ok(value) if !value.is_empty() => value,
            _ => {
                eprintln!("SKIPPED: environment variable '{}' not set.", $name);
                return;
            }
        }
    }};
}
