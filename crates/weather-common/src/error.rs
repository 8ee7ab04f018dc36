//! Error types for the weather cache services.

use thiserror::Error;

/// Result type alias using WeatherError.
pub type WeatherResult<T> = Result<T, WeatherError>;

/// Primary error type for weather operations.
#[derive(Debug, Error)]
pub enum WeatherError {
    // === Request Errors ===
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // === Upstream Errors ===
    #[error("Upstream request failed: {message}")]
    UpstreamTransport { message: String, timed_out: bool },

    #[error("Upstream rejected request ({status}): {reason}")]
    UpstreamRejected { status: u16, reason: String },

    #[error("Malformed upstream response: {0}")]
    UpstreamMalformed(String),

    // === Storage Errors ===
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl WeatherError {
    /// Stable machine-readable code, used in API error bodies and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            WeatherError::InvalidInput(_) => "invalid_input",
            WeatherError::NotFound(_) => "not_found",
            WeatherError::UpstreamTransport {
                timed_out: true, ..
            } => "upstream_timeout",
            WeatherError::UpstreamTransport { .. } => "upstream_transport",
            WeatherError::UpstreamRejected { .. } => "upstream_rejected",
            WeatherError::UpstreamMalformed(_) => "upstream_malformed",
            WeatherError::StoreUnavailable(_) => "store_unavailable",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            WeatherError::InvalidInput(_) => 400,
            WeatherError::NotFound(_) => 404,

            WeatherError::UpstreamTransport {
                timed_out: true, ..
            } => 504,
            WeatherError::UpstreamTransport { .. } | WeatherError::UpstreamRejected { .. } => 502,
            WeatherError::UpstreamMalformed(_) => 500,

            WeatherError::StoreUnavailable(_) => 503,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(WeatherError::InvalidInput("lat".into()).http_status_code(), 400);
        assert_eq!(WeatherError::NotFound("Nowhere".into()).http_status_code(), 404);
        assert_eq!(
            WeatherError::UpstreamRejected {
                status: 400,
                reason: "bad".into()
            }
            .http_status_code(),
            502
        );
        assert_eq!(
            WeatherError::UpstreamMalformed("eof".into()).http_status_code(),
            500
        );
        assert_eq!(
            WeatherError::StoreUnavailable("down".into()).http_status_code(),
            503
        );
    }

    #[test]
    fn test_transport_timeout_is_distinguished() {
        let timed_out = WeatherError::UpstreamTransport {
            message: "deadline".into(),
            timed_out: true,
        };
        let refused = WeatherError::UpstreamTransport {
            message: "connection refused".into(),
            timed_out: false,
        };

        assert_eq!(timed_out.http_status_code(), 504);
        assert_eq!(timed_out.code(), "upstream_timeout");
        assert_eq!(refused.http_status_code(), 502);
        assert_eq!(refused.code(), "upstream_transport");
    }
}
