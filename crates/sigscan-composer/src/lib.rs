//! Signal composition and risk calculation.
//!
//! Turns the per-instrument analyzer reports, manipulation verdict and
//! ML prediction into either one validated `Signal` or a suppression
//! with the first failing gate. Suppression is the default posture;
//! every gate has to pass for an emission.

pub mod compose;
pub mod risk;

pub use compose::{ComposeInputs, Composer, ComposerConfig, QualityWeights, SuppressReason, Verdict};
pub use risk::{estimated_duration_min, leverage_for, stop_loss, take_profits, RiskConfig};
