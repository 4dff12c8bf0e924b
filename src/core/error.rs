//! Error taxonomy for rate lookups and conversions.

use thiserror::Error;

/// Errors surfaced by the rate provider and the conversion engine.
///
/// Provider-level errors (`UpstreamUnavailable`, `UpstreamError`,
/// `MalformedResponse`) reach the engine unchanged and are never retried
/// again once they leave the provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RateError {
    /// The currency is on the configured exclusion list.
    #[error("Currency {0} is excluded from rate lookups")]
    CurrencyExcluded(String),

    /// Neither a direct nor an EUR-pivoted rate is available.
    #[error("No conversion path from {from} to {to}")]
    ConversionPathNotFound { from: String, to: String },

    /// The circuit breaker is open; no request was sent.
    #[error("Rate provider is temporarily unavailable")]
    UpstreamUnavailable,

    /// Non-success status, network error or timeout.
    #[error("Upstream request failed{}: {message}", status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    UpstreamError {
        status: Option<u16>,
        message: String,
    },

    /// The upstream payload could not be mapped to exchange rates.
    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    /// The caller supplied an invalid argument.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl RateError {
    /// Whether the error qualifies for a retry and counts against the
    /// circuit breaker.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::UpstreamError { .. })
    }

    /// Whether the caller can fix the request (reported as a bad request).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::CurrencyExcluded(_) | Self::InvalidRequest(_))
    }
}

impl From<reqwest::Error> for RateError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            "timeout"
        } else if err.is_connect() {
            "connection error"
        } else {
            "request error"
        };
        RateError::UpstreamError {
            status: err.status().map(|s| s.as_u16()),
            message: format!("{kind}: {err}"),
        }
    }
}

pub type Result<T, E = RateError> = std::result::Result<T, E>;
