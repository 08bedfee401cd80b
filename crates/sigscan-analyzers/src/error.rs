//! Analyzer error types.

use thiserror::Error;

/// Errors surfaced by analyzers.
///
/// `InsufficientData` is a skip condition for the caller, not a cycle
/// failure: the instrument simply lacks the lookback this analyzer needs.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Insufficient data: need {needed} candles, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Empty orderbook")]
    EmptyOrderbook,

    #[error("Non-positive price in series")]
    InvalidSeries,
}

/// Result type alias for analyzer operations.
pub type Result<T> = std::result::Result<T, AnalyzerError>;
