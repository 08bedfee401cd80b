//! Feature engineering.
//!
//! One named, fixed-order feature vector per instrument per cycle, built
//! from the four analyzer reports, the manipulation verdict and the
//! instrument's historical hit rate. The same ordering is stored on
//! `HistoricalOutcome` records, so a trained model's weights line up with
//! vectors extracted later.

use serde::{Deserialize, Serialize};
use sigscan_analyzers::{
    Lean, OrderbookReport, PatternReport, TechnicalReport, TimeframeReport, VolumeReport,
    VolumeTrend,
};
use sigscan_core::Timeframe;
use sigscan_manipulation::{ConsolidationState, ManipulationReport};

/// Feature names in vector order.
pub const FEATURE_NAMES: [&str; 36] = [
    "trend_score",
    "entry_score",
    "trend_strength",
    "technical_lean",
    "rsi_5m",
    "rsi_15m",
    "rsi_1h",
    "rsi_4h",
    "macd_score_15m",
    "bb_position_15m",
    "ema_score_15m",
    "cloud_position_1h",
    "sr_score_15m",
    "volume_score",
    "volume_lean",
    "volume_ratio",
    "spike_zscore",
    "buy_pressure_pct",
    "money_flow_ratio",
    "obv_slope_positive",
    "volume_price_correlation",
    "volume_trend",
    "orderbook_imbalance",
    "liquidity_score",
    "spread_pct",
    "bid_wall_count",
    "ask_wall_count",
    "pattern_score",
    "pattern_completion",
    "pattern_consensus",
    "cleanliness",
    "manipulation_flags",
    "consolidation",
    "volatility_pct",
    "hit_rate",
    "hit_samples",
];

/// Per-instrument realized performance, fed back as features.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HitRateStats {
    pub wins: u32,
    pub losses: u32,
}

impl HitRateStats {
    pub fn record(&mut self, won: bool) {
        if won {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
    }

    pub fn samples(&self) -> u32 {
        self.wins + self.losses
    }

    /// Win fraction; neutral 0.5 with no history.
    pub fn hit_rate(&self) -> f64 {
        let n = self.samples();
        if n == 0 {
            return 0.5;
        }
        f64::from(self.wins) / f64::from(n)
    }
}

/// Fixed-order feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: Vec<f64>,
    /// False when a source report carried no usable data; the scorer
    /// falls back to the heuristic for incomplete vectors.
    pub complete: bool,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value by feature name.
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .and_then(|i| self.values.get(i))
            .copied()
    }
}

fn lean_value(lean: Lean) -> f64 {
    match lean {
        Lean::Bullish => 1.0,
        Lean::Neutral => 0.0,
        Lean::Bearish => -1.0,
    }
}

fn tf_report(technical: &TechnicalReport, tf: Timeframe) -> Option<&TimeframeReport> {
    technical.timeframes.iter().find(|r| r.timeframe == tf)
}

/// Build the feature vector. Missing per-timeframe data degrades to
/// neutral values rather than failing.
pub fn extract(
    technical: &TechnicalReport,
    volume: &VolumeReport,
    orderbook: &OrderbookReport,
    pattern: &PatternReport,
    manipulation: &ManipulationReport,
    history: &HitRateStats,
) -> FeatureVector {
    let rsi = |tf| tf_report(technical, tf).map_or(50.0, |r| r.rsi);
    let m15 = tf_report(technical, Timeframe::M15);
    let h1 = tf_report(technical, Timeframe::H1);

    let consensus: f64 = pattern
        .formations
        .iter()
        .map(|f| lean_value(f.lean))
        .sum::<f64>()
        .clamp(-3.0, 3.0);
    let completion = pattern.strongest().map_or(0.0, |f| f.completion);

    let values = vec![
        technical.trend_score,
        technical.entry_score,
        technical.trend_strength.min(10.0),
        lean_value(technical.lean),
        rsi(Timeframe::M5),
        rsi(Timeframe::M15),
        rsi(Timeframe::H1),
        rsi(Timeframe::H4),
        m15.map_or(50.0, |r| r.macd_score),
        m15.map_or(0.5, |r| r.bb_position),
        m15.map_or(50.0, |r| r.ema_score),
        h1.map_or(0.0, |r| f64::from(r.cloud_position)),
        m15.map_or(50.0, |r| r.sr_score),
        volume.score,
        lean_value(volume.lean),
        volume.volume_ratio.min(10.0),
        volume.spike_zscore.clamp(-6.0, 6.0),
        volume.buy_pressure_pct,
        volume.money_flow_ratio,
        if volume.obv_slope_positive { 1.0 } else { 0.0 },
        volume.volume_price_correlation,
        match volume.trend {
            VolumeTrend::Increasing => 1.0,
            VolumeTrend::Stable => 0.0,
            VolumeTrend::Decreasing => -1.0,
        },
        orderbook.imbalance,
        orderbook.liquidity_score,
        orderbook.spread_pct.min(5.0),
        orderbook.bid_walls.len() as f64,
        orderbook.ask_walls.len() as f64,
        pattern.score,
        completion,
        consensus,
        manipulation.cleanliness,
        manipulation.findings.len().min(5) as f64,
        match manipulation.consolidation {
            ConsolidationState::Unstable => 0.0,
            ConsolidationState::Accumulating => 0.5,
            ConsolidationState::Stable => 1.0,
        },
        manipulation.volatility_pct.min(60.0),
        history.hit_rate(),
        f64::from(history.samples().min(50)) / 50.0,
    ];

    FeatureVector {
        complete: !technical.timeframes.is_empty(),
        values,
    }
}
