//! Confidence scorer.
//!
//! Scores a feature vector with the installed model when one exists and
//! the vector is complete; otherwise falls back to the rule-based
//! indicator vote. Either way the cycle gets a prediction.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sigscan_core::Direction;
use tracing::debug;

use crate::features::FeatureVector;
use crate::model::ModelHandle;

/// Version tag carried by heuristic predictions.
pub const FALLBACK_VERSION: &str = "heuristic-v1";

/// Scorer output for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlPrediction {
    /// None when the read is too close to neutral to call.
    pub direction: Option<Direction>,
    /// Probability that the long side wins, in [0, 1].
    pub probability: f64,
    /// Conviction in [0, 1], symmetric around neutral.
    pub confidence: f64,
    pub model_version: String,
}

impl MlPrediction {
    /// Confidence on the 0-100 scale used by the quality score.
    pub fn confidence_score(&self) -> f64 {
        self.confidence * 100.0
    }
}

/// Shared scorer. Cheap to clone; cycles read the model handle without
/// blocking retraining.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceScorer {
    handle: Arc<ModelHandle>,
}

impl ConfidenceScorer {
    pub fn new(handle: Arc<ModelHandle>) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &Arc<ModelHandle> {
        &self.handle
    }

    /// Score one feature vector. Never fails; incomplete features or a
    /// missing model fall back to the indicator vote.
    pub fn score(&self, features: &FeatureVector) -> MlPrediction {
        if features.complete {
            if let Some(model) = self.handle.current() {
                if let Some(probability) = model.predict(&features.values) {
                    return Self::from_probability(probability, model.version.clone());
                }
                debug!(
                    version = %model.version,
                    len = features.len(),
                    "Model rejected feature vector, falling back"
                );
            }
        }
        Self::heuristic(features)
    }

    fn from_probability(probability: f64, model_version: String) -> MlPrediction {
        let direction = if probability > 0.55 {
            Some(Direction::Long)
        } else if probability < 0.45 {
            Some(Direction::Short)
        } else {
            None
        };
        MlPrediction {
            direction,
            probability,
            confidence: ((probability - 0.5).abs() * 2.0).min(1.0),
            model_version,
        }
    }

    /// Rule-based indicator vote. Each family contributes a signed vote;
    /// conviction scales with the vote total and saturates at 0.85.
    fn heuristic(features: &FeatureVector) -> MlPrediction {
        let value = |name: &str, neutral: f64| features.get(name).unwrap_or(neutral);

        let mut vote = 0.0;
        let rsi = value("rsi_15m", 50.0);
        if rsi < 30.0 {
            vote += 2.0;
        } else if rsi < 40.0 {
            vote += 1.0;
        } else if rsi > 70.0 {
            vote -= 2.0;
        } else if rsi > 60.0 {
            vote -= 1.0;
        }

        let macd = value("macd_score_15m", 50.0);
        if macd > 55.0 {
            vote += 1.0;
        } else if macd < 45.0 {
            vote -= 1.0;
        }

        let volume = value("volume_score", 50.0);
        if volume > 55.0 {
            vote += 1.0;
        } else if volume < 45.0 {
            vote -= 1.0;
        }

        let trend = value("trend_score", 50.0);
        if trend > 55.0 {
            vote += 2.0;
        } else if trend < 45.0 {
            vote -= 2.0;
        }

        vote += value("cloud_position_1h", 0.0).clamp(-1.0, 1.0);

        let direction = if vote > 0.0 {
            Some(Direction::Long)
        } else if vote < 0.0 {
            Some(Direction::Short)
        } else {
            None
        };
        MlPrediction {
            direction,
            probability: (0.5 + vote / 14.0).clamp(0.0, 1.0),
            confidence: (vote.abs() * 0.15).min(0.85),
            model_version: FALLBACK_VERSION.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_NAMES;
    use crate::model::{LinearModel, TrainConfig};
    use chrono::Utc;
    use sigscan_core::{Exchange, HistoricalOutcome, InstrumentKey, OutcomeKind};
    use uuid::Uuid;

    fn neutral_vector() -> FeatureVector {
        let mut vector = FeatureVector {
            values: vec![0.0; FEATURE_NAMES.len()],
            complete: true,
        };
        for name in ["trend_score", "rsi_5m", "rsi_15m", "rsi_1h", "rsi_4h"] {
            set(&mut vector, name, 50.0);
        }
        set(&mut vector, "macd_score_15m", 50.0);
        set(&mut vector, "volume_score", 50.0);
        vector
    }

    fn set(vector: &mut FeatureVector, name: &str, value: f64) {
        let i = FEATURE_NAMES.iter().position(|n| *n == name).unwrap();
        vector.values[i] = value;
    }

    #[test]
    fn test_heuristic_neutral_abstains() {
        let scorer = ConfidenceScorer::default();
        let prediction = scorer.score(&neutral_vector());
        assert_eq!(prediction.model_version, FALLBACK_VERSION);
        assert_eq!(prediction.direction, None);
        assert!(prediction.confidence < 1e-9);
    }

    #[test]
    fn test_heuristic_oversold_uptrend_votes_long() {
        let mut vector = neutral_vector();
        set(&mut vector, "rsi_15m", 25.0);
        set(&mut vector, "trend_score", 80.0);
        set(&mut vector, "macd_score_15m", 70.0);
        set(&mut vector, "volume_score", 70.0);
        set(&mut vector, "cloud_position_1h", 1.0);

        let prediction = ConfidenceScorer::default().score(&vector);
        assert_eq!(prediction.direction, Some(Direction::Long));
        // Full 7-point vote saturates conviction at the cap.
        assert!((prediction.confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_incomplete_features_use_fallback_even_with_model() {
        let scorer = ConfidenceScorer::default();
        scorer.handle().install(trained_model());
        let mut vector = neutral_vector();
        vector.complete = false;
        let prediction = scorer.score(&vector);
        assert_eq!(prediction.model_version, FALLBACK_VERSION);
    }

    #[test]
    fn test_model_path_tags_model_version() {
        let scorer = ConfidenceScorer::default();
        let model = trained_model();
        let version = model.version.clone();
        scorer.handle().install(model);

        let mut vector = neutral_vector();
        set(&mut vector, "trend_score", 85.0);
        let prediction = scorer.score(&vector);
        assert_eq!(prediction.model_version, version);
        assert_eq!(prediction.direction, Some(Direction::Long));
    }

    fn trained_model() -> LinearModel {
        let outcomes: Vec<HistoricalOutcome> = (0..60)
            .map(|i| {
                let mut features = vec![0.0; FEATURE_NAMES.len()];
                let (value, kind) = if i % 2 == 0 {
                    (80.0 + (i % 10) as f64, OutcomeKind::Tp1Hit)
                } else {
                    (20.0 + (i % 10) as f64, OutcomeKind::SlHit)
                };
                features[0] = value;
                HistoricalOutcome {
                    signal_id: Uuid::new_v4(),
                    instrument: InstrumentKey::new(Exchange::Mexc, "BTCUSDT"),
                    direction: Direction::Long,
                    kind,
                    quality_score: 75.0,
                    features,
                    realized_pct: 0.0,
                    duration_min: 60,
                    resolved_at: Utc::now(),
                }
            })
            .collect();
        LinearModel::fit(&outcomes, &TrainConfig::default()).unwrap()
    }
}
