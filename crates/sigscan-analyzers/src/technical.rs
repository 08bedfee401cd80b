//! Multi-timeframe technical analysis.
//!
//! Each timeframe with enough lookback gets indicator family scores on a
//! 0-100 scale (50 neutral), a lean and a trend strength. Aggregation
//! weights higher timeframes more for the dominant trend and lower
//! timeframes more for entry timing; timeframes without enough candles
//! are omitted and the weights renormalized.

use serde::{Deserialize, Serialize};
use sigscan_core::{MarketSnapshot, Timeframe};
use tracing::debug;

use crate::error::{AnalyzerError, Result};
use crate::indicators::{
    self, bollinger, ichimoku, macd, rsi, support_resistance, trend, Macd, Trend,
};

/// Directional lean of an analyzer result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lean {
    Bullish,
    Bearish,
    Neutral,
}

impl Lean {
    /// Lean from a 0-100 score with a neutral dead band.
    pub fn from_score(score: f64) -> Self {
        if score > 55.0 {
            Self::Bullish
        } else if score < 45.0 {
            Self::Bearish
        } else {
            Self::Neutral
        }
    }
}

/// Indicator parameters. Defaults follow common convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalConfig {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_std: f64,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub trend_period: usize,
    pub sr_window: usize,
    /// Minimum candles a timeframe needs to participate.
    pub min_candles: usize,
}

impl Default for TechnicalConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_std: 2.0,
            ema_fast: 9,
            ema_slow: 21,
            trend_period: 20,
            sr_window: 20,
            min_candles: 50,
        }
    }
}

/// Per-timeframe indicator readout.
#[derive(Debug, Clone)]
pub struct TimeframeReport {
    pub timeframe: Timeframe,
    /// Composite 0-100 score for this timeframe.
    pub score: f64,
    pub lean: Lean,
    pub rsi: f64,
    pub rsi_score: f64,
    pub macd: Macd,
    pub macd_score: f64,
    pub bb_position: f64,
    pub bb_score: f64,
    pub ema_score: f64,
    pub trend: Trend,
    pub trend_strength: f64,
    pub trend_score: f64,
    pub sr_score: f64,
    /// Ichimoku cloud position: 1 above, -1 below, 0 inside.
    pub cloud_position: i8,
    pub supports: Vec<f64>,
    pub resistances: Vec<f64>,
}

/// Aggregated technical view across timeframes.
#[derive(Debug, Clone)]
pub struct TechnicalReport {
    pub timeframes: Vec<TimeframeReport>,
    /// Dominant-trend score, weighted toward higher timeframes.
    pub trend_score: f64,
    /// Entry-timing score, weighted toward lower timeframes.
    pub entry_score: f64,
    pub lean: Lean,
    /// Mean regression trend strength across participating timeframes.
    pub trend_strength: f64,
    /// Merged support levels across timeframes, ascending.
    pub supports: Vec<f64>,
    /// Merged resistance levels across timeframes, ascending.
    pub resistances: Vec<f64>,
}

impl TechnicalReport {
    /// Nearest support below the given price.
    pub fn nearest_support(&self, price: f64) -> Option<f64> {
        self.supports
            .iter()
            .copied()
            .filter(|s| *s < price)
            .max_by(f64::total_cmp)
    }

    /// Nearest resistance above the given price.
    pub fn nearest_resistance(&self, price: f64) -> Option<f64> {
        self.resistances
            .iter()
            .copied()
            .filter(|r| *r > price)
            .min_by(f64::total_cmp)
    }
}

/// Technical analyzer over one snapshot.
#[derive(Debug, Clone, Default)]
pub struct TechnicalAnalyzer {
    config: TechnicalConfig,
}

impl TechnicalAnalyzer {
    pub fn new(config: TechnicalConfig) -> Self {
        Self { config }
    }

    /// Analyze every configured timeframe present in the snapshot.
    ///
    /// Returns `InsufficientData` only when no timeframe has enough
    /// lookback.
    pub fn analyze(&self, snapshot: &MarketSnapshot) -> Result<TechnicalReport> {
        let mut reports = Vec::new();
        let mut most_seen = 0usize;

        for tf in Timeframe::ALL {
            let series = snapshot.series(tf);
            most_seen = most_seen.max(series.len());
            if series.len() < self.config.min_candles {
                debug!(
                    instrument = %snapshot.key,
                    timeframe = %tf,
                    candles = series.len(),
                    "Timeframe omitted from technical analysis"
                );
                continue;
            }
            if let Some(report) = self.analyze_timeframe(tf, &series.closes, &series.highs, &series.lows) {
                reports.push(report);
            }
        }

        if reports.is_empty() {
            return Err(AnalyzerError::InsufficientData {
                needed: self.config.min_candles,
                got: most_seen,
            });
        }

        let trend_score = weighted_score(&reports, |tf| tf.trend_weight() as f64);
        let entry_score = weighted_score(&reports, |tf| tf.entry_weight() as f64);
        let trend_strength =
            reports.iter().map(|r| r.trend_strength).sum::<f64>() / reports.len() as f64;

        let supports = indicators::merge_levels(
            reports.iter().flat_map(|r| r.supports.iter().copied()).collect(),
            0.005,
        );
        let resistances = indicators::merge_levels(
            reports
                .iter()
                .flat_map(|r| r.resistances.iter().copied())
                .collect(),
            0.005,
        );

        Ok(TechnicalReport {
            lean: Lean::from_score(trend_score),
            timeframes: reports,
            trend_score,
            entry_score,
            trend_strength,
            supports,
            resistances,
        })
    }

    fn analyze_timeframe(
        &self,
        timeframe: Timeframe,
        closes: &[f64],
        highs: &[f64],
        lows: &[f64],
    ) -> Option<TimeframeReport> {
        let cfg = &self.config;
        let price = *closes.last()?;

        let rsi_value = rsi(closes, cfg.rsi_period)?;
        let macd_value = macd(closes, cfg.macd_fast, cfg.macd_slow, cfg.macd_signal)?;
        let bb = bollinger(closes, cfg.bb_period, cfg.bb_std)?;
        let (trend_kind, trend_strength) = trend(closes, cfg.trend_period)?;

        let ema_fast = indicators::ema(closes, cfg.ema_fast);
        let ema_slow = indicators::ema(closes, cfg.ema_slow);

        let (supports, resistances) = support_resistance(closes, cfg.sr_window);

        let rsi_score = score_rsi(rsi_value);
        let macd_score = score_macd(&macd_value, price);
        let bb_position = bb.position(price);
        let bb_score = score_bollinger(bb_position);
        let ema_score = score_ema(ema_fast.last().copied(), ema_slow.last().copied(), price);
        let trend_score = score_trend(trend_kind, trend_strength);
        let sr_score = score_support_resistance(price, &supports, &resistances);

        let cloud_position = ichimoku(highs, lows)
            .map(|cloud| cloud.cloud_position(price))
            .unwrap_or(0);

        // Trend families carry the most weight, then momentum, then S/R.
        // Ichimoku cloud position nudges the result.
        let weight_sum = 0.20 * 2.0 + 0.25 * 3.0 + 0.15;
        let mut score = ((rsi_score + macd_score) * 0.20
            + (bb_score + ema_score + trend_score) * 0.25
            + sr_score * 0.15)
            / weight_sum;
        score = (score + cloud_position as f64 * 5.0).clamp(0.0, 100.0);

        Some(TimeframeReport {
            timeframe,
            score,
            lean: Lean::from_score(score),
            rsi: rsi_value,
            rsi_score,
            macd: macd_value,
            macd_score,
            bb_position,
            bb_score,
            ema_score,
            trend: trend_kind,
            trend_strength,
            trend_score,
            sr_score,
            cloud_position,
            supports,
            resistances,
        })
    }
}

fn weighted_score(reports: &[TimeframeReport], weight: impl Fn(Timeframe) -> f64) -> f64 {
    let mut total = 0.0;
    let mut weights = 0.0;
    for report in reports {
        let w = weight(report.timeframe);
        total += report.score * w;
        weights += w;
    }
    if weights == 0.0 {
        50.0
    } else {
        total / weights
    }
}

/// RSI band scores: oversold reads bullish, overbought bearish.
fn score_rsi(rsi: f64) -> f64 {
    if rsi <= 20.0 {
        100.0
    } else if rsi <= 30.0 {
        80.0
    } else if rsi <= 40.0 {
        60.0
    } else if rsi >= 80.0 {
        0.0
    } else if rsi >= 70.0 {
        20.0
    } else if rsi >= 60.0 {
        40.0
    } else {
        50.0
    }
}

/// Crossover direction contributes +-30, histogram strength up to +-20.
fn score_macd(macd: &Macd, price: f64) -> f64 {
    let mut score: f64 = 50.0;
    if macd.line > macd.signal && macd.histogram > 0.0 {
        score += 30.0;
    } else if macd.line < macd.signal && macd.histogram < 0.0 {
        score -= 30.0;
    }
    // Histogram relative to price so the scale is symbol-independent.
    let hist_strength = if price > 0.0 {
        (macd.histogram.abs() / price * 10_000.0).min(20.0)
    } else {
        0.0
    };
    if macd.histogram > 0.0 {
        score += hist_strength;
    } else {
        score -= hist_strength;
    }
    score.clamp(0.0, 100.0)
}

/// Band position scores: near the lower band reads bullish.
fn score_bollinger(position: f64) -> f64 {
    if position <= 0.1 {
        90.0
    } else if position <= 0.3 {
        70.0
    } else if position >= 0.9 {
        10.0
    } else if position >= 0.7 {
        30.0
    } else {
        50.0
    }
}

fn score_ema(fast: Option<f64>, slow: Option<f64>, price: f64) -> f64 {
    let (Some(fast), Some(slow)) = (fast, slow) else {
        return 50.0;
    };
    let mut score: f64 = 50.0;
    if fast > slow {
        score += 25.0;
    } else {
        score -= 25.0;
    }
    if price > fast && price > slow {
        score += 25.0;
    } else if price < fast && price < slow {
        score -= 25.0;
    }
    score.clamp(0.0, 100.0)
}

fn score_trend(trend: Trend, strength: f64) -> f64 {
    let base = match trend {
        Trend::StrongUp => 90.0,
        Trend::Up => 70.0,
        Trend::Sideways => 50.0,
        Trend::Down => 30.0,
        Trend::StrongDown => 10.0,
    };
    let adjustment = strength.min(10.0);
    match trend {
        Trend::StrongUp | Trend::Up => (base + adjustment).min(100.0),
        Trend::StrongDown | Trend::Down => (base - adjustment).max(0.0),
        Trend::Sideways => base,
    }
}

/// Proximity to support adds, proximity to resistance subtracts.
fn score_support_resistance(price: f64, supports: &[f64], resistances: &[f64]) -> f64 {
    let mut score: f64 = 50.0;
    if price <= 0.0 {
        return score;
    }
    if let Some(nearest) = nearest_level(price, supports) {
        let distance = (price - nearest).abs() / price * 100.0;
        score += match distance {
            d if d < 1.0 => 30.0,
            d if d < 2.0 => 20.0,
            d if d < 3.0 => 10.0,
            _ => 0.0,
        };
    }
    if let Some(nearest) = nearest_level(price, resistances) {
        let distance = (price - nearest).abs() / price * 100.0;
        score -= match distance {
            d if d < 1.0 => 30.0,
            d if d < 2.0 => 20.0,
            d if d < 3.0 => 10.0,
            _ => 0.0,
        };
    }
    score.clamp(0.0, 100.0)
}

fn nearest_level(price: f64, levels: &[f64]) -> Option<f64> {
    levels
        .iter()
        .copied()
        .min_by(|a, b| (a - price).abs().total_cmp(&(b - price).abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal::Decimal;
    use sigscan_core::{
        Candle, Exchange, InstrumentKey, MarketSnapshot, OrderbookSnapshot, Price, Qty,
        TickerStats,
    };
    use std::collections::BTreeMap;

    fn candle(tf: Timeframe, close: f64) -> Candle {
        let p = |v: f64| Price::new(Decimal::from_f64(v).unwrap());
        Candle {
            timeframe: tf,
            open: p(close - 0.5),
            high: p(close + 1.0),
            low: p(close - 1.0),
            close: p(close),
            volume: Qty::new(Decimal::from(100)),
            close_time: Utc::now(),
        }
    }

    fn snapshot_with(candles: BTreeMap<Timeframe, Vec<Candle>>) -> MarketSnapshot {
        let last = candles
            .values()
            .next()
            .and_then(|v| v.last())
            .map(|c| c.close)
            .unwrap_or(Price::ONE);
        MarketSnapshot {
            key: InstrumentKey::new(Exchange::Mexc, "BTCUSDT"),
            ticker: TickerStats {
                last,
                high_24h: last,
                low_24h: last,
                quote_volume_24h: Qty::new(Decimal::from(1_000_000)),
                received_at: Utc::now(),
            },
            candles,
            orderbook: OrderbookSnapshot::new(Vec::new(), Vec::new()),
            trades: Vec::new(),
            captured_at: Utc::now(),
        }
    }

    fn uptrend_candles(tf: Timeframe, n: usize) -> Vec<Candle> {
        (0..n).map(|i| candle(tf, 100.0 + i as f64 * 0.8)).collect()
    }

    #[test]
    fn test_uptrend_reads_bullish() {
        let mut candles = BTreeMap::new();
        candles.insert(Timeframe::M15, uptrend_candles(Timeframe::M15, 80));
        candles.insert(Timeframe::H1, uptrend_candles(Timeframe::H1, 80));
        let report = TechnicalAnalyzer::default()
            .analyze(&snapshot_with(candles))
            .unwrap();

        assert_eq!(report.lean, Lean::Bullish);
        assert!(report.trend_score > 55.0);
        assert_eq!(report.timeframes.len(), 2);
    }

    #[test]
    fn test_downtrend_reads_bearish() {
        let mut candles = BTreeMap::new();
        candles.insert(
            Timeframe::H1,
            (0..80).map(|i| candle(Timeframe::H1, 200.0 - i as f64)).collect(),
        );
        let report = TechnicalAnalyzer::default()
            .analyze(&snapshot_with(candles))
            .unwrap();
        assert_eq!(report.lean, Lean::Bearish);
    }

    #[test]
    fn test_insufficient_data_when_all_short() {
        let mut candles = BTreeMap::new();
        candles.insert(Timeframe::M15, uptrend_candles(Timeframe::M15, 10));
        let err = TechnicalAnalyzer::default()
            .analyze(&snapshot_with(candles))
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::InsufficientData { got: 10, .. }));
    }

    #[test]
    fn test_short_timeframes_omitted_not_fatal() {
        let mut candles = BTreeMap::new();
        candles.insert(Timeframe::M5, uptrend_candles(Timeframe::M5, 10));
        candles.insert(Timeframe::H4, uptrend_candles(Timeframe::H4, 80));
        let report = TechnicalAnalyzer::default()
            .analyze(&snapshot_with(candles))
            .unwrap();
        assert_eq!(report.timeframes.len(), 1);
        assert_eq!(report.timeframes[0].timeframe, Timeframe::H4);
    }

    #[test]
    fn test_score_tables() {
        assert_eq!(score_rsi(15.0), 100.0);
        assert_eq!(score_rsi(25.0), 80.0);
        assert_eq!(score_rsi(50.0), 50.0);
        assert_eq!(score_rsi(75.0), 20.0);
        assert_eq!(score_rsi(85.0), 0.0);

        assert_eq!(score_bollinger(0.05), 90.0);
        assert_eq!(score_bollinger(0.5), 50.0);
        assert_eq!(score_bollinger(0.95), 10.0);

        assert_eq!(score_trend(Trend::Sideways, 1.0), 50.0);
        assert!(score_trend(Trend::StrongUp, 8.0) > 90.0);
        assert!(score_trend(Trend::StrongDown, 8.0) < 10.0);
    }

    #[test]
    fn test_nearest_support_resistance_lookup() {
        let report = TechnicalReport {
            timeframes: Vec::new(),
            trend_score: 50.0,
            entry_score: 50.0,
            lean: Lean::Neutral,
            trend_strength: 0.0,
            supports: vec![90.0, 95.0],
            resistances: vec![105.0, 110.0],
        };
        assert_eq!(report.nearest_support(100.0), Some(95.0));
        assert_eq!(report.nearest_resistance(100.0), Some(105.0));
        assert_eq!(report.nearest_support(80.0), None);
    }
}
