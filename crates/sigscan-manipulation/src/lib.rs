//! Manipulation detection and consolidation tracking.
//!
//! The detector must ALL-clear an instrument before the composer may emit
//! a signal for it. The pipeline prioritizes suppressing over emitting
//! when in doubt: a suspicious-but-unconfirmed reading blocks, and only
//! a confirmed legitimate breakout may bypass the Stable-only gate.

pub mod consolidation;
pub mod detector;

pub use consolidation::{ConsolidationConfig, ConsolidationState, ConsolidationTracker};
pub use detector::{
    DetectorConfig, Finding, ManipulationDetector, ManipulationFlag, ManipulationReport, RiskLevel,
};
