//! Linear confidence model.
//!
//! Logistic regression over the named feature vector, trained offline
//! from resolved outcomes. The live handle is read-mostly: scan cycles
//! read the current `Arc`, retraining swaps a new one in atomically.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sigscan_core::HistoricalOutcome;
use tracing::info;

use crate::error::{MlError, Result};
use crate::features::FEATURE_NAMES;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub min_samples: usize,
    pub epochs: usize,
    pub learning_rate: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            min_samples: 50,
            epochs: 200,
            learning_rate: 0.05,
        }
    }
}

/// Trained logistic scorer with stored standardization parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub version: String,
    pub bias: f64,
    pub weights: Vec<f64>,
    /// Per-feature mean and standard deviation captured at training time.
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
    pub samples: usize,
    pub trained_at: DateTime<Utc>,
}

impl LinearModel {
    /// Win probability for one feature vector. None on dimension mismatch.
    pub fn predict(&self, features: &[f64]) -> Option<f64> {
        if features.len() != self.weights.len() {
            return None;
        }
        let mut z = self.bias;
        for i in 0..features.len() {
            let std = if self.stds[i] > 0.0 { self.stds[i] } else { 1.0 };
            z += self.weights[i] * (features[i] - self.means[i]) / std;
        }
        Some(sigmoid(z))
    }

    /// Train from resolved outcomes. Expired signals carry no label and
    /// are skipped.
    pub fn fit(outcomes: &[HistoricalOutcome], config: &TrainConfig) -> Result<Self> {
        let labeled: Vec<(&[f64], f64)> = outcomes
            .iter()
            .filter_map(|o| o.kind.label().map(|label| (o.features.as_slice(), label)))
            .collect();
        if labeled.len() < config.min_samples {
            return Err(MlError::NotEnoughSamples {
                needed: config.min_samples,
                got: labeled.len(),
            });
        }
        let dim = FEATURE_NAMES.len();
        for (features, _) in &labeled {
            if features.len() != dim {
                return Err(MlError::DimensionMismatch {
                    expected: dim,
                    got: features.len(),
                });
            }
        }

        let n = labeled.len() as f64;
        let mut means = vec![0.0; dim];
        for (features, _) in &labeled {
            for i in 0..dim {
                means[i] += features[i];
            }
        }
        for m in &mut means {
            *m /= n;
        }
        let mut stds = vec![0.0; dim];
        for (features, _) in &labeled {
            for i in 0..dim {
                stds[i] += (features[i] - means[i]).powi(2);
            }
        }
        for s in &mut stds {
            *s = (*s / n).sqrt();
        }

        let mut bias = 0.0;
        let mut weights = vec![0.0; dim];
        for _ in 0..config.epochs {
            for (features, label) in &labeled {
                let mut z = bias;
                for i in 0..dim {
                    let std = if stds[i] > 0.0 { stds[i] } else { 1.0 };
                    z += weights[i] * (features[i] - means[i]) / std;
                }
                let gradient = sigmoid(z) - label;
                bias -= config.learning_rate * gradient;
                for i in 0..dim {
                    let std = if stds[i] > 0.0 { stds[i] } else { 1.0 };
                    weights[i] -=
                        config.learning_rate * gradient * (features[i] - means[i]) / std;
                }
            }
        }

        let trained_at = Utc::now();
        let model = Self {
            version: format!("linear-{}", trained_at.format("%Y%m%d%H%M%S")),
            bias,
            weights,
            means,
            stds,
            samples: labeled.len(),
            trained_at,
        };
        info!(
            version = %model.version,
            samples = model.samples,
            "Model trained"
        );
        Ok(model)
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Atomically swappable model slot shared across scan cycles.
#[derive(Debug, Default)]
pub struct ModelHandle {
    slot: RwLock<Option<Arc<LinearModel>>>,
}

impl ModelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently installed model, if any.
    pub fn current(&self) -> Option<Arc<LinearModel>> {
        self.slot.read().clone()
    }

    /// Install a new model; readers pick it up on their next cycle.
    pub fn install(&self, model: LinearModel) {
        info!(version = %model.version, "Model installed");
        *self.slot.write() = Some(Arc::new(model));
    }

    pub fn version(&self) -> Option<String> {
        self.slot.read().as_ref().map(|m| m.version.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigscan_core::{Direction, Exchange, InstrumentKey, OutcomeKind};
    use uuid::Uuid;

    fn outcome(first_feature: f64, kind: OutcomeKind) -> HistoricalOutcome {
        let mut features = vec![0.5; FEATURE_NAMES.len()];
        features[0] = first_feature;
        HistoricalOutcome {
            signal_id: Uuid::new_v4(),
            instrument: InstrumentKey::new(Exchange::Mexc, "BTCUSDT"),
            direction: Direction::Long,
            kind,
            quality_score: 75.0,
            features,
            realized_pct: if kind == OutcomeKind::SlHit { -2.0 } else { 4.0 },
            duration_min: 90,
            resolved_at: Utc::now(),
        }
    }

    /// Wins at high trend score, losses at low: the model should learn a
    /// positive weight on the separating feature.
    fn separable_outcomes(n: usize) -> Vec<HistoricalOutcome> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    outcome(80.0 + (i % 10) as f64, OutcomeKind::Tp1Hit)
                } else {
                    outcome(20.0 + (i % 10) as f64, OutcomeKind::SlHit)
                }
            })
            .collect()
    }

    #[test]
    fn test_fit_learns_separable_data() {
        let model = LinearModel::fit(&separable_outcomes(60), &TrainConfig::default()).unwrap();
        assert_eq!(model.samples, 60);

        let mut winning = vec![0.5; FEATURE_NAMES.len()];
        winning[0] = 85.0;
        let mut losing = vec![0.5; FEATURE_NAMES.len()];
        losing[0] = 15.0;
        assert!(model.predict(&winning).unwrap() > 0.7);
        assert!(model.predict(&losing).unwrap() < 0.3);
    }

    #[test]
    fn test_fit_rejects_small_or_unlabeled_sets() {
        let err = LinearModel::fit(&separable_outcomes(10), &TrainConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            MlError::NotEnoughSamples { needed: 50, got: 10 }
        ));

        // Expired outcomes carry no label and do not count.
        let expired: Vec<_> = (0..60).map(|_| outcome(50.0, OutcomeKind::Expired)).collect();
        assert!(LinearModel::fit(&expired, &TrainConfig::default()).is_err());
    }

    #[test]
    fn test_predict_dimension_mismatch() {
        let model = LinearModel::fit(&separable_outcomes(60), &TrainConfig::default()).unwrap();
        assert!(model.predict(&[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_handle_swap() {
        let handle = ModelHandle::new();
        assert!(handle.current().is_none());
        let model = LinearModel::fit(&separable_outcomes(60), &TrainConfig::default()).unwrap();
        let version = model.version.clone();
        handle.install(model);
        assert_eq!(handle.version(), Some(version));
    }
}
