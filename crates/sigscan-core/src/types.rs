//! Market data types.
//!
//! Contains instruments, candles, orderbook snapshots, the trade tape, and
//! the per-cycle `MarketSnapshot` bundle that analyzers consume. Snapshots
//! are immutable once built; analyzers never mutate shared state.

use crate::{Price, Qty};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Supported exchange venues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Mexc,
    Binance,
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mexc => write!(f, "MEXC"),
            Self::Binance => write!(f, "Binance"),
        }
    }
}

/// Candle timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    M5,
    M15,
    H1,
    H4,
}

impl Timeframe {
    /// All timeframes, ascending.
    pub const ALL: [Timeframe; 4] = [Self::M5, Self::M15, Self::H1, Self::H4];

    /// Duration of one candle in minutes.
    pub fn minutes(&self) -> u32 {
        match self {
            Self::M5 => 5,
            Self::M15 => 15,
            Self::H1 => 60,
            Self::H4 => 240,
        }
    }

    /// Weight used for the dominant-trend aggregate. Higher timeframes
    /// dominate the directional call.
    pub fn trend_weight(&self) -> f64 {
        match self {
            Self::M5 => 1.0,
            Self::M15 => 2.0,
            Self::H1 => 3.0,
            Self::H4 => 4.0,
        }
    }

    /// Weight used for entry timing. Lower timeframes dominate.
    pub fn entry_weight(&self) -> f64 {
        match self {
            Self::M5 => 4.0,
            Self::M15 => 3.0,
            Self::H1 => 2.0,
            Self::H4 => 1.0,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::M5 => write!(f, "5m"),
            Self::M15 => write!(f, "15m"),
            Self::H1 => write!(f, "1h"),
            Self::H4 => write!(f, "4h"),
        }
    }
}

impl FromStr for Timeframe {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "5m" => Ok(Self::M5),
            "15m" => Ok(Self::M15),
            "1h" => Ok(Self::H1),
            "4h" => Ok(Self::H4),
            other => Err(crate::CoreError::UnknownTimeframe(other.to_string())),
        }
    }
}

/// Unique identifier for a tradable pair: venue + symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentKey {
    pub exchange: Exchange,
    /// Exchange-native symbol, e.g. "BTCUSDT".
    pub symbol: String,
}

impl InstrumentKey {
    pub fn new(exchange: Exchange, symbol: impl Into<String>) -> Self {
        Self {
            exchange,
            symbol: symbol.into(),
        }
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.symbol)
    }
}

/// A listed instrument as reported by the Market-Data Gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub key: InstrumentKey,
    pub base: String,
    pub quote: String,
    /// When the venue first listed the pair.
    pub listed_at: DateTime<Utc>,
    /// Whether the venue currently allows trading the pair.
    pub tradable: bool,
}

impl Instrument {
    /// Age of the listing in minutes at `now`.
    pub fn listing_age_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.listed_at).num_minutes()
    }
}

/// 24h rolling ticker statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerStats {
    pub last: Price,
    pub high_24h: Price,
    pub low_24h: Price,
    /// Quote-denominated 24h volume (USD for USDT pairs).
    pub quote_volume_24h: Qty,
    pub received_at: DateTime<Utc>,
}

impl TickerStats {
    /// 24h range as a percentage of the last price.
    pub fn daily_range_pct(&self) -> f64 {
        let last = self.last.to_f64();
        if last <= 0.0 {
            return 0.0;
        }
        (self.high_24h.to_f64() - self.low_24h.to_f64()) / last * 100.0
    }
}

/// A single closed candle. Immutable once closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timeframe: Timeframe,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Qty,
    /// Close timestamp of the candle.
    pub close_time: DateTime<Utc>,
}

impl Candle {
    /// Candle body size (|close - open|) in f64.
    pub fn body(&self) -> f64 {
        (self.close.to_f64() - self.open.to_f64()).abs()
    }

    /// Upper wick length in f64.
    pub fn upper_wick(&self) -> f64 {
        self.high.to_f64() - self.open.to_f64().max(self.close.to_f64())
    }

    /// Lower wick length in f64.
    pub fn lower_wick(&self) -> f64 {
        self.open.to_f64().min(self.close.to_f64()) - self.low.to_f64()
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// f64 projection of a candle slice for analyzer mathematics.
///
/// Built once per analyzer invocation; Decimal stays at the data boundary.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    pub opens: Vec<f64>,
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub closes: Vec<f64>,
    pub volumes: Vec<f64>,
}

impl CandleSeries {
    pub fn from_candles(candles: &[Candle]) -> Self {
        Self {
            opens: candles.iter().map(|c| c.open.to_f64()).collect(),
            highs: candles.iter().map(|c| c.high.to_f64()).collect(),
            lows: candles.iter().map(|c| c.low.to_f64()).collect(),
            closes: candles.iter().map(|c| c.close.to_f64()).collect(),
            volumes: candles.iter().map(|c| c.volume.to_f64()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Last close, or None when empty.
    pub fn last_close(&self) -> Option<f64> {
        self.closes.last().copied()
    }
}

/// A single price level in the book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderbookLevel {
    pub price: Price,
    pub qty: Qty,
}

impl OrderbookLevel {
    pub fn new(price: Price, qty: Qty) -> Self {
        Self { price, qty }
    }

    pub fn notional(&self) -> f64 {
        self.price.to_f64() * self.qty.to_f64()
    }
}

/// Orderbook snapshot: bids descending, asks ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderbookSnapshot {
    pub bids: Vec<OrderbookLevel>,
    pub asks: Vec<OrderbookLevel>,
    pub received_at: DateTime<Utc>,
}

impl OrderbookSnapshot {
    pub fn new(bids: Vec<OrderbookLevel>, asks: Vec<OrderbookLevel>) -> Self {
        Self {
            bids,
            asks,
            received_at: Utc::now(),
        }
    }

    pub fn best_bid(&self) -> Option<&OrderbookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&OrderbookLevel> {
        self.asks.first()
    }

    /// Mid price; None when either side is empty.
    pub fn mid_price(&self) -> Option<f64> {
        let bid = self.best_bid()?.price.to_f64();
        let ask = self.best_ask()?.price.to_f64();
        if bid <= 0.0 || ask <= 0.0 {
            return None;
        }
        Some((bid + ask) / 2.0)
    }

    /// Spread as a percentage of the best bid; None when either side is empty.
    pub fn spread_pct(&self) -> Option<f64> {
        let bid = self.best_bid()?.price.to_f64();
        let ask = self.best_ask()?.price.to_f64();
        if bid <= 0.0 {
            return None;
        }
        Some((ask - bid) / bid * 100.0)
    }

    /// Sum of bid notional within `band_pct` of mid.
    pub fn bid_depth_usd(&self, band_pct: f64) -> f64 {
        let Some(mid) = self.mid_price() else {
            return 0.0;
        };
        let floor = mid * (1.0 - band_pct / 100.0);
        self.bids
            .iter()
            .filter(|l| l.price.to_f64() >= floor)
            .map(|l| l.notional())
            .sum()
    }

    /// Sum of ask notional within `band_pct` of mid.
    pub fn ask_depth_usd(&self, band_pct: f64) -> f64 {
        let Some(mid) = self.mid_price() else {
            return 0.0;
        };
        let ceil = mid * (1.0 + band_pct / 100.0);
        self.asks
            .iter()
            .filter(|l| l.price.to_f64() <= ceil)
            .map(|l| l.notional())
            .sum()
    }
}

/// A single print on the trade tape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    pub price: Price,
    pub qty: Qty,
    /// Exchange timestamp, unix milliseconds.
    pub timestamp_ms: i64,
    /// True when the buyer was the passive side (sell aggression).
    pub is_buyer_maker: bool,
}

/// Per-instrument bundle of market data for one scan cycle.
///
/// Built fresh each cycle by the scanner from Gateway responses and never
/// mutated afterwards; the four analyzers consume it concurrently.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub key: InstrumentKey,
    pub ticker: TickerStats,
    /// Candles per timeframe, oldest first.
    pub candles: BTreeMap<Timeframe, Vec<Candle>>,
    pub orderbook: OrderbookSnapshot,
    /// Recent trade tape, oldest first.
    pub trades: Vec<TradeTick>,
    pub captured_at: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Candles for a timeframe; empty slice when the timeframe is missing.
    pub fn candles(&self, tf: Timeframe) -> &[Candle] {
        self.candles.get(&tf).map(Vec::as_slice).unwrap_or(&[])
    }

    /// f64 series for a timeframe.
    pub fn series(&self, tf: Timeframe) -> CandleSeries {
        CandleSeries::from_candles(self.candles(tf))
    }

    /// Current price: last trade if present, else ticker last.
    pub fn current_price(&self) -> f64 {
        self.trades
            .last()
            .map(|t| t.price.to_f64())
            .filter(|p| *p > 0.0)
            .unwrap_or_else(|| self.ticker.last.to_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level(price: &str, qty: &str) -> OrderbookLevel {
        OrderbookLevel::new(
            Price::new(price.parse().unwrap()),
            Qty::new(qty.parse().unwrap()),
        )
    }

    #[test]
    fn test_timeframe_parse_round_trip() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.to_string().parse::<Timeframe>().unwrap(), tf);
        }
        assert!("3d".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_spread_pct() {
        let book = OrderbookSnapshot::new(vec![level("100", "1")], vec![level("100.5", "1")]);
        let spread = book.spread_pct().unwrap();
        assert!((spread - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_depth_band_filters_far_levels() {
        let book = OrderbookSnapshot::new(
            vec![level("100", "1"), level("90", "100")],
            vec![level("101", "1"), level("120", "100")],
        );
        // 2% band around mid 100.5 excludes the 90 bid and 120 ask walls.
        assert!(book.bid_depth_usd(2.0) < 150.0);
        assert!(book.ask_depth_usd(2.0) < 150.0);
    }

    #[test]
    fn test_candle_wicks() {
        let candle = Candle {
            timeframe: Timeframe::M15,
            open: Price::new(dec!(100)),
            high: Price::new(dec!(110)),
            low: Price::new(dec!(95)),
            close: Price::new(dec!(102)),
            volume: Qty::new(dec!(10)),
            close_time: Utc::now(),
        };
        assert!((candle.body() - 2.0).abs() < 1e-9);
        assert!((candle.upper_wick() - 8.0).abs() < 1e-9);
        assert!((candle.lower_wick() - 5.0).abs() < 1e-9);
        assert!(candle.is_bullish());
    }
}
