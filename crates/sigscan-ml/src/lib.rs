//! ML confidence scoring.
//!
//! Engineers a named feature vector from the analyzer reports, scores it
//! with the currently installed linear model, and falls back to a
//! rule-based heuristic whenever no model is installed or the features
//! are incomplete. Scoring never fails a scan cycle.

pub mod error;
pub mod features;
pub mod model;
pub mod scorer;

pub use error::{MlError, Result};
pub use features::{FeatureVector, HitRateStats, FEATURE_NAMES};
pub use model::{LinearModel, ModelHandle, TrainConfig};
pub use scorer::{ConfidenceScorer, MlPrediction, FALLBACK_VERSION};
