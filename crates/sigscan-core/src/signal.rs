//! Emitted trade signal types.
//!
//! A `Signal` is the pipeline's sole output. It is immutable once emitted;
//! realized outcomes are recorded separately (`HistoricalOutcome`) and never
//! mutate the original fields.

use crate::error::{CoreError, Result};
use crate::{InstrumentKey, Price};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }

    /// Sign of a favorable move: +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// Quality tier derived from the 0-100 composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalQuality {
    Low,
    Medium,
    High,
    Excellent,
}

impl SignalQuality {
    /// Tier thresholds: Excellent >= 90, High >= 75, Medium >= 60.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::Excellent
        } else if score >= 75.0 {
            Self::High
        } else if score >= 60.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for SignalQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Excellent => write!(f, "EXCELLENT"),
        }
    }
}

/// Risk category attached to a signal.
///
/// Derived from leverage and quality score; monotonic in assessed risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Low,
    Medium,
    High,
    Extreme,
}

impl RiskCategory {
    /// Categorize from suggested leverage and quality score.
    pub fn from_leverage(leverage: u32, score: f64) -> Self {
        let base = if leverage <= 50 {
            Self::Low
        } else if leverage <= 100 {
            Self::Medium
        } else if leverage <= 200 {
            Self::High
        } else {
            Self::Extreme
        };
        // A weak score bumps the category one notch up.
        if score < 75.0 {
            match base {
                Self::Low => Self::Medium,
                Self::Medium => Self::High,
                Self::High | Self::Extreme => Self::Extreme,
            }
        } else {
            base
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Extreme => write!(f, "EXTREME"),
        }
    }
}

/// A fully composed trade recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub instrument: InstrumentKey,
    pub direction: Direction,
    pub entry: Price,
    pub tp1: Price,
    pub tp2: Price,
    pub tp3: Price,
    pub stop_loss: Price,
    /// Suggested leverage, within configured bounds.
    pub leverage: u32,
    /// Composite quality score in [0, 100].
    pub quality_score: f64,
    pub quality: SignalQuality,
    pub risk: RiskCategory,
    /// ML confidence in [0, 1]; 0.5 when the rule-based fallback was used.
    pub confidence: f64,
    /// Version of the ML model consulted, if any.
    pub model_version: Option<String>,
    /// Rough time-to-TP1 estimate in minutes.
    pub estimated_duration_min: u32,
    /// Human-readable supporting rationale, including any overridden
    /// manipulation flags.
    pub rationale: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Signal {
    /// Validate the emission invariants.
    ///
    /// - TP1 < TP2 < TP3 for LONG (inverted for SHORT)
    /// - stop loss strictly on the loss side of entry
    /// - quality score in [0, 100]
    pub fn validate(&self) -> Result<()> {
        let ordered = match self.direction {
            Direction::Long => {
                self.entry < self.tp1 && self.tp1 < self.tp2 && self.tp2 < self.tp3
            }
            Direction::Short => {
                self.entry > self.tp1 && self.tp1 > self.tp2 && self.tp2 > self.tp3
            }
        };
        if !ordered {
            return Err(CoreError::SignalInvariant(format!(
                "take-profit ordering violated for {}: {} / {} / {} from entry {}",
                self.direction, self.tp1, self.tp2, self.tp3, self.entry
            )));
        }

        let stop_ok = match self.direction {
            Direction::Long => self.stop_loss < self.entry,
            Direction::Short => self.stop_loss > self.entry,
        };
        if !stop_ok {
            return Err(CoreError::SignalInvariant(format!(
                "stop loss {} not on loss side of entry {} for {}",
                self.stop_loss, self.entry, self.direction
            )));
        }

        if !(0.0..=100.0).contains(&self.quality_score) {
            return Err(CoreError::SignalInvariant(format!(
                "quality score {} outside [0, 100]",
                self.quality_score
            )));
        }

        Ok(())
    }

    /// Gain to TP1 as a percentage of entry (positive for both directions).
    pub fn tp1_gain_pct(&self) -> f64 {
        let entry = self.entry.to_f64();
        if entry <= 0.0 {
            return 0.0;
        }
        ((self.tp1.to_f64() - entry) / entry * 100.0) * self.direction.sign()
    }

    /// Risk/reward ratio: distance to TP1 over distance to stop.
    pub fn risk_reward(&self) -> f64 {
        let risk = (self.entry.to_f64() - self.stop_loss.to_f64()).abs();
        if risk <= 0.0 {
            return 0.0;
        }
        (self.tp1.to_f64() - self.entry.to_f64()).abs() / risk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Exchange;
    use rust_decimal_macros::dec;

    fn long_signal() -> Signal {
        Signal {
            id: Uuid::new_v4(),
            instrument: InstrumentKey::new(Exchange::Mexc, "BTCUSDT"),
            direction: Direction::Long,
            entry: Price::new(dec!(100)),
            tp1: Price::new(dec!(104)),
            tp2: Price::new(dec!(108)),
            tp3: Price::new(dec!(112)),
            stop_loss: Price::new(dec!(98)),
            leverage: 50,
            quality_score: 82.0,
            quality: SignalQuality::High,
            risk: RiskCategory::Low,
            confidence: 0.7,
            model_version: None,
            estimated_duration_min: 120,
            rationale: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_valid_long_signal() {
        let signal = long_signal();
        assert!(signal.validate().is_ok());
        assert!((signal.tp1_gain_pct() - 4.0).abs() < 1e-9);
        assert!((signal.risk_reward() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_tp_ordering_rejected() {
        let mut signal = long_signal();
        signal.tp2 = Price::new(dec!(103));
        assert!(signal.validate().is_err());
    }

    #[test]
    fn test_stop_on_wrong_side_rejected() {
        let mut signal = long_signal();
        signal.stop_loss = Price::new(dec!(101));
        assert!(signal.validate().is_err());
    }

    #[test]
    fn test_short_ordering() {
        let mut signal = long_signal();
        signal.direction = Direction::Short;
        signal.tp1 = Price::new(dec!(96));
        signal.tp2 = Price::new(dec!(92));
        signal.tp3 = Price::new(dec!(88));
        signal.stop_loss = Price::new(dec!(102));
        assert!(signal.validate().is_ok());
        assert!((signal.tp1_gain_pct() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_quality_tiers() {
        assert_eq!(SignalQuality::from_score(95.0), SignalQuality::Excellent);
        assert_eq!(SignalQuality::from_score(80.0), SignalQuality::High);
        assert_eq!(SignalQuality::from_score(65.0), SignalQuality::Medium);
        assert_eq!(SignalQuality::from_score(10.0), SignalQuality::Low);
    }

    #[test]
    fn test_risk_category_monotonic_in_leverage() {
        assert_eq!(RiskCategory::from_leverage(30, 85.0), RiskCategory::Low);
        assert_eq!(RiskCategory::from_leverage(90, 85.0), RiskCategory::Medium);
        assert_eq!(RiskCategory::from_leverage(150, 85.0), RiskCategory::High);
        assert_eq!(RiskCategory::from_leverage(300, 85.0), RiskCategory::Extreme);
        // Weak score bumps the category.
        assert_eq!(RiskCategory::from_leverage(30, 70.0), RiskCategory::Medium);
    }
}
