//! Composition pipeline.
//!
//! Ordered gates over one instrument's reports. The first failing gate
//! suppresses the signal with its reason; only a full pass emits.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sigscan_analyzers::{Lean, OrderbookReport, PatternReport, TechnicalReport, VolumeReport};
use sigscan_core::{Direction, InstrumentKey, Price, RiskCategory, Signal, SignalQuality};
use sigscan_manipulation::{ConsolidationState, ManipulationFlag, ManipulationReport};
use sigscan_ml::MlPrediction;
use tracing::{debug, info};
use uuid::Uuid;

use crate::risk::{self, RiskConfig};

/// Weights for the composite quality score. They sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityWeights {
    pub trend: f64,
    pub volume: f64,
    pub liquidity: f64,
    pub pattern: f64,
    pub ml: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            trend: 0.25,
            volume: 0.20,
            liquidity: 0.20,
            pattern: 0.15,
            ml: 0.20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposerConfig {
    pub risk: RiskConfig,
    pub weights: QualityWeights,
    /// Minimum quality score for emission.
    pub min_quality_score: f64,
    /// ML probability distance from 0.5 required to break a tied vote.
    pub ml_tiebreak_probability: f64,
    /// Formation completion required for the breakout exemption.
    pub breakout_completion: f64,
    /// Volume ratio required for the breakout exemption.
    pub breakout_volume_ratio: f64,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            risk: RiskConfig::default(),
            weights: QualityWeights::default(),
            min_quality_score: 70.0,
            ml_tiebreak_probability: 0.55,
            breakout_completion: 0.9,
            breakout_volume_ratio: 2.0,
        }
    }
}

/// Why the composer suppressed instead of emitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum SuppressReason {
    InvalidPrice,
    NoDirection,
    ManipulationBlocked { flags: Vec<String> },
    NotConsolidated { state: ConsolidationState },
    QualityBelowMinimum { score: f64 },
    RiskRewardTooLow { ratio: f64 },
    InvariantViolation { detail: String },
}

impl SuppressReason {
    /// Stable reason name, used as a metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidPrice => "invalid_price",
            Self::NoDirection => "no_direction",
            Self::ManipulationBlocked { .. } => "manipulation_blocked",
            Self::NotConsolidated { .. } => "not_consolidated",
            Self::QualityBelowMinimum { .. } => "quality_below_minimum",
            Self::RiskRewardTooLow { .. } => "risk_reward_too_low",
            Self::InvariantViolation { .. } => "invariant_violation",
        }
    }
}

/// Composition outcome for one instrument.
#[derive(Debug, Clone)]
pub enum Verdict {
    Emit(Box<Signal>),
    Suppress(SuppressReason),
}

impl Verdict {
    pub fn signal(&self) -> Option<&Signal> {
        match self {
            Self::Emit(signal) => Some(signal),
            Self::Suppress(_) => None,
        }
    }
}

/// Everything the composer needs for one instrument.
pub struct ComposeInputs<'a> {
    pub key: &'a InstrumentKey,
    /// Current price from the latest snapshot.
    pub price: f64,
    pub technical: &'a TechnicalReport,
    pub volume: &'a VolumeReport,
    pub orderbook: &'a OrderbookReport,
    pub pattern: &'a PatternReport,
    pub manipulation: &'a ManipulationReport,
    pub prediction: &'a MlPrediction,
}

#[derive(Debug, Clone, Default)]
pub struct Composer {
    config: ComposerConfig,
}

impl Composer {
    pub fn new(config: ComposerConfig) -> Self {
        Self { config }
    }

    pub fn compose(&self, inputs: &ComposeInputs<'_>) -> Verdict {
        let config = &self.config;
        if inputs.price <= 0.0 || !inputs.price.is_finite() {
            return Verdict::Suppress(SuppressReason::InvalidPrice);
        }

        let Some(direction) = self.vote_direction(inputs) else {
            return Verdict::Suppress(SuppressReason::NoDirection);
        };

        if !inputs.manipulation.safe_to_trade {
            return Verdict::Suppress(SuppressReason::ManipulationBlocked {
                flags: inputs.manipulation.reasons(),
            });
        }

        let mut rationale = Vec::new();
        let breakout = self.breakout_exempt(inputs, direction);
        if inputs.manipulation.consolidation != ConsolidationState::Stable {
            if !breakout {
                return Verdict::Suppress(SuppressReason::NotConsolidated {
                    state: inputs.manipulation.consolidation,
                });
            }
            rationale.push("breakout exemption: confirmed formation with volume".to_string());
            // Overridden findings stay visible on the emitted signal.
            rationale.extend(inputs.manipulation.reasons());
        }

        let quality_score = self.quality_score(inputs, direction);
        if quality_score < config.min_quality_score {
            debug!(
                instrument = %inputs.key,
                quality_score,
                "Quality below emission minimum"
            );
            return Verdict::Suppress(SuppressReason::QualityBelowMinimum {
                score: quality_score,
            });
        }

        let entry = inputs.price;
        let (tp1, tp2, tp3) = risk::take_profits(
            direction,
            entry,
            quality_score,
            inputs.technical,
            &config.risk,
        );
        let stop = risk::stop_loss(direction, entry, inputs.technical, &config.risk);

        let ratio = (tp1 - entry).abs() / (entry - stop).abs().max(f64::EPSILON);
        if ratio < config.risk.min_risk_reward {
            return Verdict::Suppress(SuppressReason::RiskRewardTooLow { ratio });
        }

        let volatility = inputs.manipulation.volatility_pct;
        let leverage = risk::leverage_for(
            volatility,
            quality_score,
            inputs.manipulation.risk,
            &config.risk,
        );
        let tp1_pct = (tp1 - entry).abs() / entry * 100.0;

        rationale.extend(self.describe(inputs, direction));

        let prices = [entry, tp1, tp2, tp3, stop].map(Price::from_f64);
        let [Some(entry), Some(tp1), Some(tp2), Some(tp3), Some(stop)] = prices else {
            return Verdict::Suppress(SuppressReason::InvalidPrice);
        };

        let signal = Signal {
            id: Uuid::new_v4(),
            instrument: inputs.key.clone(),
            direction,
            entry,
            tp1,
            tp2,
            tp3,
            stop_loss: stop,
            leverage,
            quality_score,
            quality: SignalQuality::from_score(quality_score),
            risk: RiskCategory::from_leverage(leverage, quality_score),
            confidence: inputs.prediction.confidence,
            model_version: Some(inputs.prediction.model_version.clone()),
            estimated_duration_min: risk::estimated_duration_min(volatility, tp1_pct),
            rationale,
            created_at: Utc::now(),
        };

        if let Err(err) = signal.validate() {
            return Verdict::Suppress(SuppressReason::InvariantViolation {
                detail: err.to_string(),
            });
        }

        info!(
            instrument = %inputs.key,
            direction = %signal.direction,
            quality_score = signal.quality_score,
            leverage = signal.leverage,
            "Signal composed"
        );
        Verdict::Emit(Box::new(signal))
    }

    /// Weighted analyzer vote. Technical counts double; a tie defers to
    /// the ML prediction when it is confident enough, otherwise the
    /// instrument is skipped.
    fn vote_direction(&self, inputs: &ComposeInputs<'_>) -> Option<Direction> {
        let vote = lean_vote(inputs.technical.lean) * 2.0
            + lean_vote(inputs.volume.lean)
            + lean_vote(inputs.orderbook.lean)
            + lean_vote(inputs.pattern.lean);
        if vote > 0.0 {
            return Some(Direction::Long);
        }
        if vote < 0.0 {
            return Some(Direction::Short);
        }
        let p = inputs.prediction.probability;
        if p >= self.config.ml_tiebreak_probability {
            Some(Direction::Long)
        } else if p <= 1.0 - self.config.ml_tiebreak_probability {
            Some(Direction::Short)
        } else {
            None
        }
    }

    /// Composite 0-100 quality. Directional scores flip for shorts so a
    /// strongly bearish read scores as high quality for a short.
    fn quality_score(&self, inputs: &ComposeInputs<'_>, direction: Direction) -> f64 {
        let w = &self.config.weights;
        let directional = |score: f64| match direction {
            Direction::Long => score,
            Direction::Short => 100.0 - score,
        };
        let score = w.trend * directional(inputs.technical.trend_score)
            + w.volume * directional(inputs.volume.score)
            + w.liquidity * inputs.orderbook.liquidity_score
            + w.pattern * directional(inputs.pattern.score)
            + w.ml * inputs.prediction.confidence_score();
        score.clamp(0.0, 100.0)
    }

    /// Legitimate breakout: a near-complete formation leaning the same
    /// way, volume well above its average, and no pump/dump finding.
    fn breakout_exempt(&self, inputs: &ComposeInputs<'_>, direction: Direction) -> bool {
        let aligned = |lean: Lean| match direction {
            Direction::Long => lean == Lean::Bullish,
            Direction::Short => lean == Lean::Bearish,
        };
        let formation_confirms = inputs.pattern.formations.iter().any(|f| {
            f.completion >= self.config.breakout_completion && aligned(f.lean)
        });
        formation_confirms
            && inputs.volume.volume_ratio >= self.config.breakout_volume_ratio
            && !inputs.manipulation.has(ManipulationFlag::Pump)
            && !inputs.manipulation.has(ManipulationFlag::Dump)
    }

    fn describe(&self, inputs: &ComposeInputs<'_>, direction: Direction) -> Vec<String> {
        let mut lines = vec![format!(
            "{} vote: technical {:?}, volume {:?}, orderbook {:?}, pattern {:?}",
            direction,
            inputs.technical.lean,
            inputs.volume.lean,
            inputs.orderbook.lean,
            inputs.pattern.lean
        )];
        if let Some(formation) = inputs.pattern.strongest() {
            lines.push(format!(
                "{:?} at {:.0}% completion",
                formation.kind,
                formation.completion * 100.0
            ));
        }
        if inputs.volume.spike {
            lines.push(format!(
                "volume spike ({:.1} sigma)",
                inputs.volume.spike_zscore
            ));
        }
        lines.push(format!(
            "ml {} p={:.2} conf={:.2}",
            inputs.prediction.model_version,
            inputs.prediction.probability,
            inputs.prediction.confidence
        ));
        lines
    }
}

fn lean_vote(lean: Lean) -> f64 {
    match lean {
        Lean::Bullish => 1.0,
        Lean::Neutral => 0.0,
        Lean::Bearish => -1.0,
    }
}
