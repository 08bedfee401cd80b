//! Consolidation state machine.
//!
//! Tracks per-instrument calm periods. An instrument is `Accumulating`
//! while volatility stays under the threshold and `Stable` once a
//! continuous configured duration has elapsed with no manipulation flag.
//! Any flag or volatility breach resets to `Unstable`.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sigscan_core::InstrumentKey;
use tracing::debug;

/// Per-instrument consolidation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsolidationState {
    /// Recently flagged or volatile.
    Unstable,
    /// Calm, but not yet for the full stabilization window.
    Accumulating,
    /// Calm for at least the full stabilization window.
    Stable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    /// Volatility (percent) above which the instrument is not calm.
    pub max_volatility_pct: f64,
    /// Continuous calm minutes required before `Stable`.
    pub stabilization_minutes: i64,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            max_volatility_pct: 3.0,
            stabilization_minutes: 120,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    calm_since: DateTime<Utc>,
}

/// Single-writer consolidation tracker.
///
/// The scanner thread calls `observe` once per instrument per cycle after
/// the manipulation assessment completes.
#[derive(Debug, Default)]
pub struct ConsolidationTracker {
    config: ConsolidationConfig,
    entries: HashMap<InstrumentKey, Entry>,
}

impl ConsolidationTracker {
    pub fn new(config: ConsolidationConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
        }
    }

    /// Record one observation and return the resulting state.
    ///
    /// `flagged` is whether the manipulation detector raised any flag
    /// this cycle. The `Stable` boundary is inclusive: exactly
    /// `stabilization_minutes` of continuous calm is Stable, one minute
    /// less is still Accumulating.
    pub fn observe(
        &mut self,
        key: &InstrumentKey,
        volatility_pct: f64,
        flagged: bool,
        now: DateTime<Utc>,
    ) -> ConsolidationState {
        if flagged || volatility_pct >= self.config.max_volatility_pct {
            if self.entries.remove(key).is_some() {
                debug!(instrument = %key, volatility_pct, flagged, "Consolidation reset");
            }
            return ConsolidationState::Unstable;
        }

        let entry = self
            .entries
            .entry(key.clone())
            .or_insert(Entry { calm_since: now });

        let calm_for = now - entry.calm_since;
        if calm_for >= Duration::minutes(self.config.stabilization_minutes) {
            ConsolidationState::Stable
        } else {
            ConsolidationState::Accumulating
        }
    }

    /// Current state without recording an observation.
    pub fn state(&self, key: &InstrumentKey, now: DateTime<Utc>) -> ConsolidationState {
        match self.entries.get(key) {
            None => ConsolidationState::Unstable,
            Some(entry) => {
                if now - entry.calm_since
                    >= Duration::minutes(self.config.stabilization_minutes)
                {
                    ConsolidationState::Stable
                } else {
                    ConsolidationState::Accumulating
                }
            }
        }
    }

    /// Drop instruments no longer being scanned.
    pub fn retain(&mut self, keys: &[InstrumentKey]) {
        self.entries.retain(|k, _| keys.contains(k));
    }
}
