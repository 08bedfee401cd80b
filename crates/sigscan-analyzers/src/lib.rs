//! Market analyzers.
//!
//! Four independent analyzers over one immutable `MarketSnapshot`:
//! technical indicators per timeframe, volume structure, orderbook
//! structure and chart patterns. All computation is synchronous and
//! pure; `Decimal` inputs are projected to `f64` at the boundary and
//! results carry `f64` scores in [0, 100].

pub mod error;
pub mod indicators;
pub mod orderbook;
pub mod pattern;
pub mod technical;
pub mod volume;

pub use error::{AnalyzerError, Result};
pub use orderbook::{
    OrderbookAnalyzer, OrderbookConfig, OrderbookReport, Wall, WallSide, WallStrength,
};
pub use pattern::{
    CandleEvent, CandleEventKind, Formation, FormationKind, PatternAnalyzer, PatternConfig,
    PatternReport,
};
pub use technical::{Lean, TechnicalAnalyzer, TechnicalConfig, TechnicalReport, TimeframeReport};
pub use volume::{VolumeAnalyzer, VolumeConfig, VolumeProfile, VolumeReport, VolumeTrend};
