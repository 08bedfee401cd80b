//! Chart formation and candlestick event recognition.
//!
//! Local-extrema sequencing with tolerance bands over the 15m series.
//! Every simultaneous match is kept; each formation carries a completion
//! degree, an implied target and an invalidation level so the composer
//! can pick conservative take-profit and stop levels.

use serde::{Deserialize, Serialize};
use sigscan_core::{Candle, MarketSnapshot, Timeframe};

use crate::error::{AnalyzerError, Result};
use crate::indicators::{linreg_slope, mean, stddev};
use crate::technical::Lean;

/// Recognized formation shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormationKind {
    DoubleTop,
    DoubleBottom,
    HeadAndShoulders,
    InverseHeadAndShoulders,
    AscendingTriangle,
    DescendingTriangle,
    SymmetricalTriangle,
    BullFlag,
    BearFlag,
    RisingWedge,
    FallingWedge,
}

/// A matched formation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Formation {
    pub kind: FormationKind,
    pub lean: Lean,
    /// How far the formation has progressed, in [0, 1].
    pub completion: f64,
    /// Measured-move price target if the formation resolves.
    pub target: f64,
    /// Price level at which the formation is void.
    pub invalidation: f64,
}

/// Single- to three-candle reversal/indecision events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandleEventKind {
    BullishEngulfing,
    BearishEngulfing,
    Hammer,
    HangingMan,
    Doji,
    MorningStar,
    EveningStar,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandleEvent {
    pub kind: CandleEventKind,
    pub lean: Lean,
}

/// Pattern analysis result.
#[derive(Debug, Clone)]
pub struct PatternReport {
    pub formations: Vec<Formation>,
    pub events: Vec<CandleEvent>,
    /// Composite 0-100 score from formation consensus.
    pub score: f64,
    pub lean: Lean,
}

impl PatternReport {
    /// The most complete formation, if any matched.
    pub fn strongest(&self) -> Option<&Formation> {
        self.formations
            .iter()
            .max_by(|a, b| a.completion.total_cmp(&b.completion))
    }
}

/// Pattern recognition parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Relative tolerance for double-top/bottom peak similarity.
    pub double_tolerance: f64,
    /// Relative tolerance for head-and-shoulders shoulder similarity.
    pub shoulder_tolerance: f64,
    pub min_candles: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            double_tolerance: 0.03,
            shoulder_tolerance: 0.05,
            min_candles: 30,
        }
    }
}

/// Pattern analyzer over one snapshot.
#[derive(Debug, Clone, Default)]
pub struct PatternAnalyzer {
    config: PatternConfig,
}

impl PatternAnalyzer {
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, snapshot: &MarketSnapshot) -> Result<PatternReport> {
        let candles = snapshot.candles(Timeframe::M15);
        let series = snapshot.series(Timeframe::M15);
        if series.len() < self.config.min_candles {
            return Err(AnalyzerError::InsufficientData {
                needed: self.config.min_candles,
                got: series.len(),
            });
        }

        let highs = &series.highs;
        let lows = &series.lows;
        let closes = &series.closes;
        let last = closes[closes.len() - 1];

        let mut formations = Vec::new();
        formations.extend(self.detect_double_top(highs, lows, last));
        formations.extend(self.detect_double_bottom(highs, lows, last));
        formations.extend(self.detect_head_shoulders(highs, lows, last));
        formations.extend(self.detect_inverse_head_shoulders(highs, lows, last));
        formations.extend(detect_triangle(highs, lows, last));
        formations.extend(detect_flag(closes));
        formations.extend(detect_wedge(highs, lows, last));

        let events = detect_candle_events(candles);

        let score = pattern_score(&formations);

        Ok(PatternReport {
            formations,
            events,
            score,
            lean: Lean::from_score(score),
        })
    }

    fn detect_double_top(&self, highs: &[f64], lows: &[f64], last: f64) -> Option<Formation> {
        let window = tail(highs, 30);
        let peaks = find_peaks(window, 2);
        if peaks.len() < 2 {
            return None;
        }
        let (i1, i2) = (peaks[peaks.len() - 2], peaks[peaks.len() - 1]);
        let (p1, p2) = (window[i1], window[i2]);
        let similarity = (p1 - p2).abs() / p1;
        if similarity >= self.config.double_tolerance {
            return None;
        }
        let peak = p1.max(p2);
        let lows_window = tail(lows, 30);
        let neckline = lows_window[i1..=i2]
            .iter()
            .copied()
            .fold(f64::MAX, f64::min);
        if neckline >= peak {
            return None;
        }
        Some(Formation {
            kind: FormationKind::DoubleTop,
            lean: Lean::Bearish,
            completion: completion_toward(peak, neckline, last),
            target: neckline - (peak - neckline),
            invalidation: peak,
        })
    }

    fn detect_double_bottom(&self, highs: &[f64], lows: &[f64], last: f64) -> Option<Formation> {
        let window = tail(lows, 30);
        let valleys = find_valleys(window, 2);
        if valleys.len() < 2 {
            return None;
        }
        let (i1, i2) = (valleys[valleys.len() - 2], valleys[valleys.len() - 1]);
        let (v1, v2) = (window[i1], window[i2]);
        if v1 <= 0.0 {
            return None;
        }
        let similarity = (v1 - v2).abs() / v1;
        if similarity >= self.config.double_tolerance {
            return None;
        }
        let bottom = v1.min(v2);
        let highs_window = tail(highs, 30);
        let neckline = highs_window[i1..=i2]
            .iter()
            .copied()
            .fold(f64::MIN, f64::max);
        if neckline <= bottom {
            return None;
        }
        Some(Formation {
            kind: FormationKind::DoubleBottom,
            lean: Lean::Bullish,
            completion: completion_toward(bottom, neckline, last),
            target: neckline + (neckline - bottom),
            invalidation: bottom,
        })
    }

    fn detect_head_shoulders(&self, highs: &[f64], lows: &[f64], last: f64) -> Option<Formation> {
        let window = tail(highs, 40);
        let peaks = find_peaks(window, 2);
        if peaks.len() < 3 {
            return None;
        }
        let (l, h, r) = (
            peaks[peaks.len() - 3],
            peaks[peaks.len() - 2],
            peaks[peaks.len() - 1],
        );
        let (left, head, right) = (window[l], window[h], window[r]);
        if !(head > left && head > right) || left <= 0.0 {
            return None;
        }
        let shoulder_similarity = (left - right).abs() / left;
        if shoulder_similarity >= self.config.shoulder_tolerance {
            return None;
        }
        let lows_window = tail(lows, 40);
        let neckline = lows_window[l..=r].iter().copied().fold(f64::MAX, f64::min);
        if neckline >= head {
            return None;
        }
        Some(Formation {
            kind: FormationKind::HeadAndShoulders,
            lean: Lean::Bearish,
            completion: completion_toward(head, neckline, last),
            target: neckline - (head - neckline),
            invalidation: head,
        })
    }

    fn detect_inverse_head_shoulders(
        &self,
        highs: &[f64],
        lows: &[f64],
        last: f64,
    ) -> Option<Formation> {
        let window = tail(lows, 40);
        let valleys = find_valleys(window, 2);
        if valleys.len() < 3 {
            return None;
        }
        let (l, h, r) = (
            valleys[valleys.len() - 3],
            valleys[valleys.len() - 2],
            valleys[valleys.len() - 1],
        );
        let (left, head, right) = (window[l], window[h], window[r]);
        if !(head < left && head < right) || left <= 0.0 {
            return None;
        }
        let shoulder_similarity = (left - right).abs() / left;
        if shoulder_similarity >= self.config.shoulder_tolerance {
            return None;
        }
        let highs_window = tail(highs, 40);
        let neckline = highs_window[l..=r].iter().copied().fold(f64::MIN, f64::max);
        if neckline <= head {
            return None;
        }
        Some(Formation {
            kind: FormationKind::InverseHeadAndShoulders,
            lean: Lean::Bullish,
            completion: completion_toward(head, neckline, last),
            target: neckline + (neckline - head),
            invalidation: head,
        })
    }
}

/// Progress of price from the extreme toward the neckline, in [0, 1].
fn completion_toward(extreme: f64, neckline: f64, last: f64) -> f64 {
    let span = extreme - neckline;
    if span == 0.0 {
        return 0.0;
    }
    ((extreme - last) / span).clamp(0.0, 1.0)
}

fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

fn find_peaks(values: &[f64], prominence: usize) -> Vec<usize> {
    let mut peaks = Vec::new();
    if values.len() <= 2 * prominence {
        return peaks;
    }
    for i in prominence..values.len() - prominence {
        let is_peak =
            (1..=prominence).all(|j| values[i] > values[i - j] && values[i] > values[i + j]);
        if is_peak {
            peaks.push(i);
        }
    }
    peaks
}

fn find_valleys(values: &[f64], prominence: usize) -> Vec<usize> {
    let mut valleys = Vec::new();
    if values.len() <= 2 * prominence {
        return valleys;
    }
    for i in prominence..values.len() - prominence {
        let is_valley =
            (1..=prominence).all(|j| values[i] < values[i - j] && values[i] < values[i + j]);
        if is_valley {
            valleys.push(i);
        }
    }
    valleys
}

/// Triangle detection from normalized trendline slopes over 20 candles.
fn detect_triangle(highs: &[f64], lows: &[f64], last: f64) -> Option<Formation> {
    let h = tail(highs, 20);
    let l = tail(lows, 20);
    if h.len() < 20 {
        return None;
    }
    let price = mean(h);
    if price <= 0.0 {
        return None;
    }
    // Slopes per bar relative to price, so thresholds are symbol-independent.
    let high_slope = linreg_slope(h) / price;
    let low_slope = linreg_slope(l) / price;

    let resistance = h.iter().copied().fold(f64::MIN, f64::max);
    let support = l.iter().copied().fold(f64::MAX, f64::min);
    let height = resistance - support;
    let contraction = range_contraction(h, l);

    if high_slope.abs() < 0.001 && low_slope > 0.002 {
        return Some(Formation {
            kind: FormationKind::AscendingTriangle,
            lean: Lean::Bullish,
            completion: contraction,
            target: resistance + height,
            invalidation: support,
        });
    }
    if high_slope < -0.002 && low_slope.abs() < 0.001 {
        return Some(Formation {
            kind: FormationKind::DescendingTriangle,
            lean: Lean::Bearish,
            completion: contraction,
            target: support - height,
            invalidation: resistance,
        });
    }
    if high_slope < -0.001 && low_slope > 0.001 {
        let lean = if last > (resistance + support) / 2.0 {
            Lean::Bullish
        } else {
            Lean::Bearish
        };
        return Some(Formation {
            kind: FormationKind::SymmetricalTriangle,
            lean,
            completion: contraction,
            target: if lean == Lean::Bullish {
                resistance + height
            } else {
                support - height
            },
            invalidation: if lean == Lean::Bullish { support } else { resistance },
        });
    }
    None
}

/// How much the candle range narrowed from the first half to the second.
fn range_contraction(highs: &[f64], lows: &[f64]) -> f64 {
    let half = highs.len() / 2;
    let first: f64 = highs[..half]
        .iter()
        .zip(&lows[..half])
        .map(|(h, l)| h - l)
        .sum();
    let second: f64 = highs[half..]
        .iter()
        .zip(&lows[half..])
        .map(|(h, l)| h - l)
        .sum();
    if first <= 0.0 {
        return 0.0;
    }
    (1.0 - second / first).clamp(0.0, 1.0)
}

/// Flag: an impulse move then a tight consolidation.
fn detect_flag(closes: &[f64]) -> Option<Formation> {
    let window = tail(closes, 30);
    if window.len() < 30 {
        return None;
    }
    let (impulse, consolidation) = window.split_at(15);
    if impulse[0] <= 0.0 {
        return None;
    }
    let impulse_change = (impulse[impulse.len() - 1] - impulse[0]) / impulse[0] * 100.0;
    let cons_mean = mean(consolidation);
    if cons_mean <= 0.0 {
        return None;
    }
    let cons_volatility = stddev(consolidation) / cons_mean * 100.0;
    if cons_volatility >= 3.0 {
        return None;
    }

    let last = window[window.len() - 1];
    let cons_low = consolidation.iter().copied().fold(f64::MAX, f64::min);
    let cons_high = consolidation.iter().copied().fold(f64::MIN, f64::max);
    let impulse_size = (impulse[impulse.len() - 1] - impulse[0]).abs();

    if impulse_change > 5.0 {
        return Some(Formation {
            kind: FormationKind::BullFlag,
            lean: Lean::Bullish,
            completion: 0.7,
            target: last + impulse_size,
            invalidation: cons_low,
        });
    }
    if impulse_change < -5.0 {
        return Some(Formation {
            kind: FormationKind::BearFlag,
            lean: Lean::Bearish,
            completion: 0.7,
            target: last - impulse_size,
            invalidation: cons_high,
        });
    }
    None
}

/// Wedge: both trendlines in the same direction with converging slopes.
fn detect_wedge(highs: &[f64], lows: &[f64], last: f64) -> Option<Formation> {
    let h = tail(highs, 20);
    let l = tail(lows, 20);
    if h.len() < 20 {
        return None;
    }
    let price = mean(h);
    if price <= 0.0 {
        return None;
    }
    let high_slope = linreg_slope(h) / price;
    let low_slope = linreg_slope(l) / price;
    let contraction = range_contraction(h, l);
    let support = l.iter().copied().fold(f64::MAX, f64::min);
    let resistance = h.iter().copied().fold(f64::MIN, f64::max);

    // A close outside the range means the wedge already resolved.
    if last < support || last > resistance {
        return None;
    }

    // Rising wedge: both rising, support steeper. Bearish.
    if high_slope > 0.0 && low_slope > 0.0 && low_slope > high_slope * 1.2 {
        return Some(Formation {
            kind: FormationKind::RisingWedge,
            lean: Lean::Bearish,
            completion: contraction,
            target: support,
            invalidation: resistance,
        });
    }
    // Falling wedge: both falling, resistance steeper. Bullish.
    if high_slope < 0.0 && low_slope < 0.0 && low_slope.abs() > high_slope.abs() * 1.2 {
        return Some(Formation {
            kind: FormationKind::FallingWedge,
            lean: Lean::Bullish,
            completion: contraction,
            target: resistance,
            invalidation: support,
        });
    }
    None
}

fn detect_candle_events(candles: &[Candle]) -> Vec<CandleEvent> {
    let mut events = Vec::new();
    let n = candles.len();
    if n >= 2 {
        if let Some(event) = detect_engulfing(&candles[n - 2], &candles[n - 1]) {
            events.push(event);
        }
    }
    if n >= 1 {
        events.extend(detect_hammer(&candles[n - 1]));
        events.extend(detect_doji(&candles[n - 1]));
    }
    if n >= 3 {
        events.extend(detect_star(&candles[n - 3], &candles[n - 2], &candles[n - 1]));
    }
    events
}

fn detect_engulfing(prev: &Candle, curr: &Candle) -> Option<CandleEvent> {
    let (po, pc) = (prev.open.to_f64(), prev.close.to_f64());
    let (co, cc) = (curr.open.to_f64(), curr.close.to_f64());

    if pc < po && cc > co && co <= pc && cc >= po {
        return Some(CandleEvent {
            kind: CandleEventKind::BullishEngulfing,
            lean: Lean::Bullish,
        });
    }
    if pc > po && cc < co && co >= pc && cc <= po {
        return Some(CandleEvent {
            kind: CandleEventKind::BearishEngulfing,
            lean: Lean::Bearish,
        });
    }
    None
}

fn detect_hammer(candle: &Candle) -> Option<CandleEvent> {
    let body = candle.body();
    if body <= 0.0 {
        return None;
    }
    if candle.lower_wick() > body * 2.0 && candle.upper_wick() < body * 0.5 {
        return Some(if candle.is_bullish() {
            CandleEvent {
                kind: CandleEventKind::Hammer,
                lean: Lean::Bullish,
            }
        } else {
            CandleEvent {
                kind: CandleEventKind::HangingMan,
                lean: Lean::Bearish,
            }
        });
    }
    None
}

fn detect_doji(candle: &Candle) -> Option<CandleEvent> {
    let range = candle.high.to_f64() - candle.low.to_f64();
    if range > 0.0 && candle.body() / range < 0.1 {
        return Some(CandleEvent {
            kind: CandleEventKind::Doji,
            lean: Lean::Neutral,
        });
    }
    None
}

fn detect_star(first: &Candle, second: &Candle, third: &Candle) -> Option<CandleEvent> {
    let small_middle = second.body() < first.body() * 0.3;
    if !small_middle {
        return None;
    }
    if !first.is_bullish() && third.is_bullish() {
        return Some(CandleEvent {
            kind: CandleEventKind::MorningStar,
            lean: Lean::Bullish,
        });
    }
    if first.is_bullish() && !third.is_bullish() {
        return Some(CandleEvent {
            kind: CandleEventKind::EveningStar,
            lean: Lean::Bearish,
        });
    }
    None
}

/// 50-neutral score from formation completion and consensus.
fn pattern_score(formations: &[Formation]) -> f64 {
    let mut score = 50.0;

    if let Some(strongest) = formations
        .iter()
        .max_by(|a, b| a.completion.total_cmp(&b.completion))
    {
        let boost = strongest.completion * 30.0;
        match strongest.lean {
            Lean::Bullish => score += boost,
            Lean::Bearish => score -= boost,
            Lean::Neutral => {}
        }
    }

    let bullish = formations.iter().filter(|f| f.lean == Lean::Bullish).count() as f64;
    let bearish = formations.iter().filter(|f| f.lean == Lean::Bearish).count() as f64;
    score += (bullish - bearish) * 5.0;

    score.clamp(0.0, 100.0)
}
