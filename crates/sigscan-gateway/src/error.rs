//! Gateway error types.

use thiserror::Error;

/// Errors surfaced by market data fetches.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The endpoint answered but the requested data does not exist
    /// (delisted symbol, empty candle history).
    #[error("Data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Exchange rejected the request due to rate limiting.
    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Request did not complete within the deadline.
    #[error("Request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Authentication or permission failure. Never retryable.
    #[error("Auth error: {0}")]
    Auth(String),

    /// Transport-level failure (connection reset, DNS, malformed body).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl GatewayError {
    /// Stable error kind, used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DataUnavailable { .. } => "data_unavailable",
            Self::RateLimited { .. } => "rate_limited",
            Self::Timeout { .. } => "timeout",
            Self::Auth(_) => "auth",
            Self::Transport(_) => "transport",
            Self::Decode(_) => "decode",
        }
    }

    /// Whether a retry with backoff could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Transport(_)
        )
    }
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
