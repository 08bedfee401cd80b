//! Error types for sigscan-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid quantity: {0}")]
    InvalidQty(String),

    #[error("Invalid instrument key: {0}")]
    InvalidInstrumentKey(String),

    #[error("Unknown timeframe: {0}")]
    UnknownTimeframe(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("Signal invariant violated: {0}")]
    SignalInvariant(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
