//! Realized signal outcomes.
//!
//! Outcomes are recorded after a signal resolves and are the training
//! input for the ML scorer. They never mutate the originating `Signal`.

use crate::signal::Direction;
use crate::InstrumentKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// How a signal resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// First take-profit reached.
    Tp1Hit,
    /// Second take-profit reached.
    Tp2Hit,
    /// Third take-profit reached.
    Tp3Hit,
    /// Stop loss reached before any take-profit.
    SlHit,
    /// Neither side reached within the tracking window.
    Expired,
}

impl OutcomeKind {
    /// Whether the outcome counts as a win for training purposes.
    /// Expired signals are neutral and excluded from the label set.
    pub fn label(&self) -> Option<f64> {
        match self {
            Self::Tp1Hit | Self::Tp2Hit | Self::Tp3Hit => Some(1.0),
            Self::SlHit => Some(0.0),
            Self::Expired => None,
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tp1Hit => write!(f, "tp1_hit"),
            Self::Tp2Hit => write!(f, "tp2_hit"),
            Self::Tp3Hit => write!(f, "tp3_hit"),
            Self::SlHit => write!(f, "sl_hit"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// A resolved signal with its realized result and the feature vector it
/// was scored with at emission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalOutcome {
    pub signal_id: Uuid,
    pub instrument: InstrumentKey,
    pub direction: Direction,
    pub kind: OutcomeKind,
    /// Composite quality score the signal carried at emission.
    pub quality_score: f64,
    /// Feature vector captured at emission, in scorer feature order.
    pub features: Vec<f64>,
    /// Realized percent move from entry, signed in the signal's favor.
    pub realized_pct: f64,
    /// Minutes between emission and resolution.
    pub duration_min: u32,
    pub resolved_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(OutcomeKind::Tp1Hit.label(), Some(1.0));
        assert_eq!(OutcomeKind::Tp3Hit.label(), Some(1.0));
        assert_eq!(OutcomeKind::SlHit.label(), Some(0.0));
        assert_eq!(OutcomeKind::Expired.label(), None);
    }
}
