//! Volume structure analysis.
//!
//! Works on the 15m candle series: OBV, money flow, buy/sell pressure,
//! accumulation/distribution, z-score spike detection and a volume
//! profile (value area + point of control). The spike flag feeds the
//! manipulation detector.

use serde::{Deserialize, Serialize};
use sigscan_core::{MarketSnapshot, Timeframe};

use crate::error::{AnalyzerError, Result};
use crate::indicators::{
    accumulation_distribution, correlation, mean, money_flow_ratio, obv, sma, zscore_last,
};
use crate::technical::Lean;

/// Volume trend over the recent window against the prior window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeTrend {
    Increasing,
    Decreasing,
    Stable,
}

/// Volume analysis parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeConfig {
    pub ma_period: usize,
    /// Candles in the trend comparison windows.
    pub trend_period: usize,
    /// Z-score above which the last candle's volume is a spike.
    pub spike_zscore: f64,
    /// Price levels in the volume profile.
    pub profile_levels: usize,
    /// Share of total volume inside the value area.
    pub value_area_share: f64,
    pub min_candles: usize,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            ma_period: 20,
            trend_period: 10,
            spike_zscore: 2.5,
            profile_levels: 50,
            value_area_share: 0.7,
            min_candles: 30,
        }
    }
}

/// Volume profile summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeProfile {
    pub value_area_low: f64,
    pub value_area_high: f64,
    /// Price level with the most traded volume.
    pub point_of_control: f64,
}

/// Volume analysis result.
#[derive(Debug, Clone)]
pub struct VolumeReport {
    /// Composite 0-100 confirmation score.
    pub score: f64,
    pub lean: Lean,
    /// Last volume over its moving average.
    pub volume_ratio: f64,
    pub trend: VolumeTrend,
    /// Z-score of the last candle's volume; `spike` when above threshold.
    pub spike_zscore: f64,
    pub spike: bool,
    pub buy_pressure_pct: f64,
    pub sell_pressure_pct: f64,
    pub obv: f64,
    pub obv_slope_positive: bool,
    pub money_flow_ratio: f64,
    pub ad_line: f64,
    pub volume_price_correlation: f64,
    pub profile: VolumeProfile,
    pub price_above_value_area: bool,
    pub price_below_value_area: bool,
}

/// Volume analyzer over one snapshot.
#[derive(Debug, Clone, Default)]
pub struct VolumeAnalyzer {
    config: VolumeConfig,
}

impl VolumeAnalyzer {
    pub fn new(config: VolumeConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, snapshot: &MarketSnapshot) -> Result<VolumeReport> {
        let cfg = &self.config;
        let series = snapshot.series(Timeframe::M15);
        if series.len() < cfg.min_candles {
            return Err(AnalyzerError::InsufficientData {
                needed: cfg.min_candles,
                got: series.len(),
            });
        }

        let volumes = &series.volumes;
        let closes = &series.closes;
        let price = snapshot.current_price();

        let volume_ma = sma(volumes, cfg.ma_period);
        let avg_volume = volume_ma.last().copied().unwrap_or_else(|| mean(volumes));
        let current_volume = volumes[volumes.len() - 1];
        let volume_ratio = if avg_volume > 0.0 {
            current_volume / avg_volume
        } else {
            1.0
        };

        let trend = volume_trend(volumes, cfg.trend_period);

        let spike_window = &volumes[volumes.len().saturating_sub(20)..];
        let spike_zscore = zscore_last(spike_window).unwrap_or(0.0);
        let spike = spike_zscore > cfg.spike_zscore;

        let (buy_pressure_pct, sell_pressure_pct) = pressure_split(
            &series.opens[series.len().saturating_sub(20)..],
            &closes[closes.len().saturating_sub(20)..],
            &volumes[volumes.len().saturating_sub(20)..],
        );

        let obv_value = obv(closes, volumes);
        let tail = closes.len().saturating_sub(10);
        let obv_slope_positive = obv(&closes[tail..], &volumes[tail..]) > 0.0;

        let mfr = money_flow_ratio(&series.highs, &series.lows, closes, volumes);
        let ad_line = accumulation_distribution(&series.highs, &series.lows, closes, volumes);

        let corr_tail = closes.len().saturating_sub(20);
        let volume_price_correlation = correlation(&volumes[corr_tail..], &closes[corr_tail..]);

        let profile = volume_profile(
            &series.highs,
            &series.lows,
            volumes,
            cfg.profile_levels,
            cfg.value_area_share,
        );

        let score = confirmation_score(
            volume_ratio,
            trend,
            volume_price_correlation,
            buy_pressure_pct - sell_pressure_pct,
            spike,
            spike_zscore,
            ad_line,
        );

        Ok(VolumeReport {
            score,
            lean: Lean::from_score(score),
            volume_ratio,
            trend,
            spike_zscore,
            spike,
            buy_pressure_pct,
            sell_pressure_pct,
            obv: obv_value,
            obv_slope_positive,
            money_flow_ratio: mfr,
            ad_line,
            volume_price_correlation,
            profile,
            price_above_value_area: price > profile.value_area_high,
            price_below_value_area: price < profile.value_area_low,
        })
    }
}

fn volume_trend(volumes: &[f64], period: usize) -> VolumeTrend {
    if volumes.len() < period {
        return VolumeTrend::Stable;
    }
    let recent = mean(&volumes[volumes.len() - period..]);
    let older_slice = if volumes.len() >= 2 * period {
        &volumes[volumes.len() - 2 * period..volumes.len() - period]
    } else {
        &volumes[volumes.len() - period..]
    };
    let older = mean(older_slice);
    if recent > older * 1.2 {
        VolumeTrend::Increasing
    } else if recent < older * 0.8 {
        VolumeTrend::Decreasing
    } else {
        VolumeTrend::Stable
    }
}

/// Buy/sell volume split by candle direction, as percentages.
fn pressure_split(opens: &[f64], closes: &[f64], volumes: &[f64]) -> (f64, f64) {
    let n = opens.len().min(closes.len()).min(volumes.len());
    let mut buy = 0.0;
    let mut sell = 0.0;
    for i in 0..n {
        if closes[i] > opens[i] {
            buy += volumes[i];
        } else if closes[i] < opens[i] {
            sell += volumes[i];
        } else {
            buy += volumes[i] / 2.0;
            sell += volumes[i] / 2.0;
        }
    }
    let total = buy + sell;
    if total == 0.0 {
        (50.0, 50.0)
    } else {
        (buy / total * 100.0, sell / total * 100.0)
    }
}

/// Distribute candle volume across price levels; find POC and the
/// smallest set of levels holding `value_area_share` of total volume.
fn volume_profile(
    highs: &[f64],
    lows: &[f64],
    volumes: &[f64],
    num_levels: usize,
    value_area_share: f64,
) -> VolumeProfile {
    let n = highs.len().min(lows.len()).min(volumes.len());
    let max_price = highs[..n].iter().copied().fold(f64::MIN, f64::max);
    let min_price = lows[..n].iter().copied().fold(f64::MAX, f64::min);
    if n == 0 || max_price <= min_price {
        return VolumeProfile {
            value_area_low: min_price,
            value_area_high: max_price,
            point_of_control: (min_price + max_price) / 2.0,
        };
    }

    let step = (max_price - min_price) / num_levels as f64;
    let mut level_volume = vec![0.0f64; num_levels];
    for i in 0..n {
        for (j, vol) in level_volume.iter_mut().enumerate() {
            let level_price = min_price + j as f64 * step;
            if lows[i] <= level_price && level_price <= highs[i] {
                *vol += volumes[i];
            }
        }
    }

    let mut order: Vec<usize> = (0..num_levels).collect();
    order.sort_by(|a, b| level_volume[*b].total_cmp(&level_volume[*a]));

    let poc_index = order[0];
    let total: f64 = level_volume.iter().sum();
    let target = total * value_area_share;

    let mut accumulated = 0.0;
    let mut in_area: Vec<usize> = Vec::new();
    for &idx in &order {
        accumulated += level_volume[idx];
        in_area.push(idx);
        if accumulated >= target {
            break;
        }
    }
    let low_idx = in_area.iter().copied().min().unwrap_or(poc_index);
    let high_idx = in_area.iter().copied().max().unwrap_or(poc_index);

    VolumeProfile {
        value_area_low: min_price + low_idx as f64 * step,
        value_area_high: min_price + high_idx as f64 * step,
        point_of_control: min_price + poc_index as f64 * step,
    }
}

#[allow(clippy::too_many_arguments)]
fn confirmation_score(
    volume_ratio: f64,
    trend: VolumeTrend,
    correlation: f64,
    net_pressure: f64,
    spike: bool,
    spike_zscore: f64,
    ad_line: f64,
) -> f64 {
    let mut score = 50.0;

    if volume_ratio >= 3.0 {
        score += 30.0;
    } else if volume_ratio >= 2.0 {
        score += 20.0;
    } else if volume_ratio >= 1.5 {
        score += 10.0;
    } else if volume_ratio < 0.5 {
        score -= 20.0;
    }

    match trend {
        VolumeTrend::Increasing => score += 15.0,
        VolumeTrend::Decreasing => score -= 15.0,
        VolumeTrend::Stable => {}
    }

    if correlation > 0.5 {
        score += 10.0;
    } else if correlation < -0.5 {
        score -= 10.0;
    }

    score += net_pressure / 5.0;

    if spike {
        score += ((spike_zscore - 2.5) * 10.0 / 2.0).clamp(0.0, 20.0);
    }

    if ad_line > 0.0 {
        score += 10.0;
    } else {
        score -= 10.0;
    }

    score.clamp(0.0, 100.0)
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

    fn candle(open: f64, close: f64, volume: f64) -> Candle {
        let p = |v: f64| Price::new(Decimal::from_f64(v).unwrap());
        Candle {
            timeframe: Timeframe::M15,
            open: p(open),
            high: p(open.max(close) + 0.5),
            low: p(open.min(close) - 0.5),
            close: p(close),
            volume: Qty::new(Decimal::from_f64(volume).unwrap()),
            close_time: Utc::now(),
        }
    }

    fn snapshot(candles_15m: Vec<Candle>) -> MarketSnapshot {
        let last = candles_15m.last().map(|c| c.close).unwrap_or(Price::ONE);
        let mut candles = BTreeMap::new();
        candles.insert(Timeframe::M15, candles_15m);
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

    #[test]
    fn test_bullish_accumulation_scores_high() {
        // Rising closes on rising volume, buy-heavy candles.
        let candles: Vec<Candle> = (0..40)
            .map(|i| candle(100.0 + i as f64, 101.0 + i as f64, 50.0 + i as f64 * 2.0))
            .collect();
        let report = VolumeAnalyzer::default().analyze(&snapshot(candles)).unwrap();

        assert!(report.score > 60.0);
        assert_eq!(report.lean, Lean::Bullish);
        assert_eq!(report.trend, VolumeTrend::Increasing);
        assert!(report.buy_pressure_pct > 90.0);
        assert!(report.obv_slope_positive);
    }

    #[test]
    fn test_volume_spike_flagged() {
        let mut candles: Vec<Candle> = (0..40)
            .map(|i| candle(100.0, 100.5, 50.0 + (i % 3) as f64))
            .collect();
        candles.push(candle(100.0, 100.5, 400.0));
        let report = VolumeAnalyzer::default().analyze(&snapshot(candles)).unwrap();

        assert!(report.spike);
        assert!(report.spike_zscore > 2.5);
    }

    #[test]
    fn test_no_spike_on_steady_volume() {
        let candles: Vec<Candle> = (0..40).map(|_| candle(100.0, 100.2, 50.0)).collect();
        let report = VolumeAnalyzer::default().analyze(&snapshot(candles)).unwrap();
        assert!(!report.spike);
    }

    #[test]
    fn test_insufficient_data() {
        let candles: Vec<Candle> = (0..10).map(|_| candle(100.0, 100.2, 50.0)).collect();
        let err = VolumeAnalyzer::default()
            .analyze(&snapshot(candles))
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::InsufficientData { .. }));
    }

    #[test]
    fn test_profile_poc_at_heavy_level() {
        // Most volume trades near 100; a brief excursion to 120.
        let mut candles: Vec<Candle> = (0..35).map(|_| candle(99.5, 100.5, 500.0)).collect();
        candles.extend((0..5).map(|_| candle(119.5, 120.5, 10.0)));
        let report = VolumeAnalyzer::default().analyze(&snapshot(candles)).unwrap();

        assert!(report.profile.point_of_control < 105.0);
        assert!(report.price_above_value_area);
    }

    #[test]
    fn test_pressure_split_balanced() {
        let (buy, sell) = pressure_split(&[100.0, 100.0], &[101.0, 99.0], &[10.0, 10.0]);
        assert_eq!(buy, 50.0);
        assert_eq!(sell, 50.0);
    }
}
