//! Prometheus counters for the cache tiers, upstream, and backfill.

use metrics::counter;

use weather_common::WeatherError;

use crate::orchestrator::DataSource;

/// Count a served point or history request by the tier that answered it.
pub fn record_request(source: DataSource) {
    counter!("weather_requests_total", "source" => source.as_str()).increment(1);
}

pub fn record_eviction() {
    counter!("fast_cache_evictions_total").increment(1);
}

pub fn record_upstream_error(err: &WeatherError) {
    counter!("upstream_errors_total", "kind" => err.code()).increment(1);
}

/// `outcome` is `"success"` or `"failure"`.
pub fn record_backfill_city(outcome: &'static str) {
    counter!("backfill_cities_total", "outcome" => outcome).increment(1);
}
