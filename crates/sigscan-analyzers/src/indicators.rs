//! Indicator kernels.
//!
//! Plain functions over `f64` slices. Callers project candle data through
//! `CandleSeries` before invoking these; every function returns `None`
//! (or an empty vec) when the lookback is too short rather than padding.

/// Arithmetic mean. Zero for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation. Zero for an empty slice.
pub fn stddev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Simple moving average series. Empty when `values.len() < period`.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    values
        .windows(period)
        .map(|w| w.iter().sum::<f64>() / period as f64)
        .collect()
}

/// Exponential moving average series seeded with the SMA of the first
/// `period` values. Empty when `values.len() < period`.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;
    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    for &v in &values[period..] {
        let prev = *out.last().unwrap_or(&seed);
        out.push((v - prev) * multiplier + prev);
    }
    out
}

/// RSI over the last `period` deltas.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if closes.len() < period + 1 {
        return None;
    }
    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let recent = &deltas[deltas.len() - period..];
    let avg_gain = recent.iter().filter(|d| **d > 0.0).sum::<f64>() / period as f64;
    let avg_loss = -recent.iter().filter(|d| **d < 0.0).sum::<f64>() / period as f64;
    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// MACD line, signal line and histogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

pub fn macd(closes: &[f64], fast: usize, slow: usize, signal_period: usize) -> Option<Macd> {
    if closes.len() < slow {
        return None;
    }
    let ema_fast = ema(closes, fast);
    let ema_slow = ema(closes, slow);
    if ema_fast.is_empty() || ema_slow.is_empty() {
        return None;
    }
    // Align the fast series to the slow one's start.
    let offset = ema_fast.len() - ema_slow.len();
    let macd_series: Vec<f64> = ema_slow
        .iter()
        .enumerate()
        .map(|(i, s)| ema_fast[i + offset] - s)
        .collect();
    let line = *macd_series.last()?;
    let signal_series = ema(&macd_series, signal_period);
    let signal = signal_series.last().copied().unwrap_or(0.0);
    Some(Macd {
        line,
        signal,
        histogram: line - signal,
    })
}

/// Bollinger bands at the latest close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bollinger {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl Bollinger {
    /// Close position within the band: 0 at lower, 1 at upper.
    pub fn position(&self, price: f64) -> f64 {
        let width = self.upper - self.lower;
        if width <= 0.0 {
            return 0.5;
        }
        (price - self.lower) / width
    }
}

pub fn bollinger(closes: &[f64], period: usize, k: f64) -> Option<Bollinger> {
    if closes.len() < period {
        return None;
    }
    let window = &closes[closes.len() - period..];
    let middle = mean(window);
    let std = stddev(window);
    Some(Bollinger {
        upper: middle + k * std,
        middle,
        lower: middle - k * std,
    })
}

/// Least-squares slope of evenly spaced values.
pub fn linreg_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let y_mean = mean(values);
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Trend classification from a regression over the last `period` closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    StrongUp,
    Up,
    Sideways,
    Down,
    StrongDown,
}

impl Trend {
    pub fn is_up(&self) -> bool {
        matches!(self, Self::StrongUp | Self::Up)
    }

    pub fn is_down(&self) -> bool {
        matches!(self, Self::StrongDown | Self::Down)
    }
}

/// Detect trend direction and strength over the last `period` closes.
///
/// Strength is |slope| relative to the mean price, scaled by the period.
pub fn trend(closes: &[f64], period: usize) -> Option<(Trend, f64)> {
    if closes.len() < period {
        return None;
    }
    let recent = &closes[closes.len() - period..];
    let slope = linreg_slope(recent);
    let avg = mean(recent);
    if avg <= 0.0 {
        return None;
    }
    let strength = slope.abs() / avg * 100.0 * period as f64;
    let t = if strength > 5.0 {
        if slope > 0.0 {
            Trend::StrongUp
        } else {
            Trend::StrongDown
        }
    } else if strength > 2.0 {
        if slope > 0.0 {
            Trend::Up
        } else {
            Trend::Down
        }
    } else {
        Trend::Sideways
    };
    Some((t, strength))
}

/// Local-extrema support and resistance levels, similar levels merged.
pub fn support_resistance(prices: &[f64], window: usize) -> (Vec<f64>, Vec<f64>) {
    if prices.len() < 2 * window + 1 {
        return (Vec::new(), Vec::new());
    }
    let mut supports = Vec::new();
    let mut resistances = Vec::new();
    for i in window..prices.len() - window {
        let neighborhood = &prices[i - window..=i + window];
        let v = prices[i];
        if neighborhood.iter().all(|&p| v <= p) {
            supports.push(v);
        }
        if neighborhood.iter().all(|&p| v >= p) {
            resistances.push(v);
        }
    }
    (merge_levels(supports, 0.02), merge_levels(resistances, 0.02))
}

/// Merge levels within `threshold` relative distance by averaging.
pub fn merge_levels(mut levels: Vec<f64>, threshold: f64) -> Vec<f64> {
    levels.sort_by(|a, b| a.total_cmp(b));
    let mut merged: Vec<f64> = Vec::with_capacity(levels.len());
    for level in levels {
        match merged.last_mut() {
            Some(last) if *last > 0.0 && (level - *last).abs() / *last <= threshold => {
                *last = (*last + level) / 2.0;
            }
            _ => merged.push(level),
        }
    }
    merged
}

/// Average true range over the last `period` ranges.
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Option<f64> {
    let n = highs.len().min(lows.len()).min(closes.len());
    if n < period + 1 {
        return None;
    }
    let mut true_ranges = Vec::with_capacity(n - 1);
    for i in 1..n {
        let hl = highs[i] - lows[i];
        let hc = (highs[i] - closes[i - 1]).abs();
        let lc = (lows[i] - closes[i - 1]).abs();
        true_ranges.push(hl.max(hc).max(lc));
    }
    Some(mean(&true_ranges[true_ranges.len() - period..]))
}

/// On-balance volume over the whole series.
pub fn obv(closes: &[f64], volumes: &[f64]) -> f64 {
    let n = closes.len().min(volumes.len());
    let mut total = 0.0;
    for i in 1..n {
        if closes[i] > closes[i - 1] {
            total += volumes[i];
        } else if closes[i] < closes[i - 1] {
            total -= volumes[i];
        }
    }
    total
}

/// Money flow ratio over typical prices, capped at 10.
pub fn money_flow_ratio(highs: &[f64], lows: &[f64], closes: &[f64], volumes: &[f64]) -> f64 {
    let n = highs.len().min(lows.len()).min(closes.len()).min(volumes.len());
    let mut positive = 0.0;
    let mut negative = 0.0;
    let typical = |i: usize| (highs[i] + lows[i] + closes[i]) / 3.0;
    for i in 1..n {
        let flow = typical(i) * volumes[i];
        if typical(i) > typical(i - 1) {
            positive += flow;
        } else if typical(i) < typical(i - 1) {
            negative += flow;
        }
    }
    if negative == 0.0 {
        return 10.0;
    }
    (positive / negative).min(10.0)
}

/// Accumulation/distribution line over the whole series.
pub fn accumulation_distribution(highs: &[f64], lows: &[f64], closes: &[f64], volumes: &[f64]) -> f64 {
    let n = highs.len().min(lows.len()).min(closes.len()).min(volumes.len());
    let mut ad = 0.0;
    for i in 0..n {
        let range = highs[i] - lows[i];
        if range > 0.0 {
            let multiplier = ((closes[i] - lows[i]) - (highs[i] - closes[i])) / range;
            ad += multiplier * volumes[i];
        }
    }
    ad
}

/// Pearson correlation. Zero when degenerate.
pub fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let (ma, mb) = (mean(a), mean(b));
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for i in 0..n {
        let (da, db) = (a[i] - ma, b[i] - mb);
        cov += da * db;
        va += da * da;
        vb += db * db;
    }
    let den = (va * vb).sqrt();
    if den == 0.0 {
        0.0
    } else {
        cov / den
    }
}

/// Ichimoku cloud values at the latest candle (9/26/52 periods).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ichimoku {
    pub tenkan: f64,
    pub kijun: f64,
    pub senkou_a: f64,
    pub senkou_b: f64,
}

impl Ichimoku {
    /// 1 above the cloud, -1 below, 0 inside.
    pub fn cloud_position(&self, price: f64) -> i8 {
        let top = self.senkou_a.max(self.senkou_b);
        let bottom = self.senkou_a.min(self.senkou_b);
        if price > top {
            1
        } else if price < bottom {
            -1
        } else {
            0
        }
    }
}

fn midpoint(highs: &[f64], lows: &[f64], period: usize) -> Option<f64> {
    let n = highs.len().min(lows.len());
    if n < period {
        return None;
    }
    let hh = highs[n - period..].iter().copied().fold(f64::MIN, f64::max);
    let ll = lows[n - period..].iter().copied().fold(f64::MAX, f64::min);
    Some((hh + ll) / 2.0)
}

pub fn ichimoku(highs: &[f64], lows: &[f64]) -> Option<Ichimoku> {
    let tenkan = midpoint(highs, lows, 9)?;
    let kijun = midpoint(highs, lows, 26)?;
    let senkou_b = midpoint(highs, lows, 52)?;
    Some(Ichimoku {
        tenkan,
        kijun,
        senkou_a: (tenkan + kijun) / 2.0,
        senkou_b,
    })
}

/// Daily volatility in percent from a series of 15m closes:
/// stddev of simple returns scaled to the 96 15m bars in a day.
pub fn daily_volatility_pct(closes_15m: &[f64]) -> Option<f64> {
    if closes_15m.len() < 2 {
        return None;
    }
    let mut returns = Vec::with_capacity(closes_15m.len() - 1);
    for w in closes_15m.windows(2) {
        if w[0] <= 0.0 {
            return None;
        }
        returns.push((w[1] - w[0]) / w[0]);
    }
    Some(stddev(&returns) * 96f64.sqrt() * 100.0)
}

/// Z-score of the last value against the window preceding statistics.
pub fn zscore_last(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let s = stddev(values);
    if s == 0.0 {
        return None;
    }
    Some((values[values.len() - 1] - m) / s)
}
