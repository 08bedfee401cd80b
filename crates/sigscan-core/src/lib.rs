//! Core domain types for the sigscan signal pipeline.
//!
//! This crate provides fundamental types used throughout the scanner:
//! - `InstrumentKey`: Unique identifier for a tradable pair (exchange + symbol)
//! - `Price`, `Qty`: Precision-safe numeric types
//! - `Candle`, `OrderbookSnapshot`, `TradeTick`, `MarketSnapshot`: market data
//! - `Signal`, `Direction`, `SignalQuality`, `RiskCategory`: emitted output
//! - `HistoricalOutcome`: realized signal results fed back to the ML scorer

pub mod decimal;
pub mod error;
pub mod outcome;
pub mod signal;
pub mod types;

pub use decimal::{Price, Qty};
pub use error::{CoreError, Result};
pub use outcome::{HistoricalOutcome, OutcomeKind};
pub use signal::{Direction, RiskCategory, Signal, SignalQuality};
pub use types::{
    Candle, CandleSeries, Exchange, Instrument, InstrumentKey, MarketSnapshot, OrderbookLevel,
    OrderbookSnapshot, TickerStats, Timeframe, TradeTick,
};
