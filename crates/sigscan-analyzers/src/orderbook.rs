//! Orderbook structure analysis.
//!
//! Depth imbalance inside a configured band around mid, liquidity walls
//! against the mean level notional, spread re-validation at analysis time
//! and a 0-100 liquidity quality scalar.

use serde::{Deserialize, Serialize};
use sigscan_core::{MarketSnapshot, OrderbookLevel};

use crate::error::{AnalyzerError, Result};
use crate::technical::Lean;

/// Side of the book a wall sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WallSide {
    Bid,
    Ask,
}

/// Wall strength by multiple of the mean level notional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WallStrength {
    Moderate,
    Strong,
    VeryStrong,
}

/// A resting order block large enough to act as support or resistance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wall {
    pub side: WallSide,
    pub price: f64,
    pub notional_usd: f64,
    /// Distance from mid in percent.
    pub distance_pct: f64,
    pub strength: WallStrength,
}

/// Orderbook analysis parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderbookConfig {
    /// Band around mid for depth aggregation, in percent.
    pub depth_band_pct: f64,
    /// Levels inspected for walls.
    pub wall_scan_levels: usize,
    /// Wall threshold as a multiple of mean level notional.
    pub wall_multiple: f64,
    /// Spread above this fails re-validation, in percent.
    pub max_spread_pct: f64,
}

impl Default for OrderbookConfig {
    fn default() -> Self {
        Self {
            depth_band_pct: 2.0,
            wall_scan_levels: 20,
            wall_multiple: 3.0,
            max_spread_pct: 0.5,
        }
    }
}

/// Orderbook analysis result.
#[derive(Debug, Clone)]
pub struct OrderbookReport {
    pub lean: Lean,
    /// Bid depth minus ask depth over total, in [-1, 1].
    pub imbalance: f64,
    pub bid_depth_usd: f64,
    pub ask_depth_usd: f64,
    pub spread_pct: f64,
    /// Whether the spread still passes the configured limit.
    pub spread_ok: bool,
    /// 0-100 liquidity quality.
    pub liquidity_score: f64,
    pub bid_walls: Vec<Wall>,
    pub ask_walls: Vec<Wall>,
}

impl OrderbookReport {
    pub fn has_strong_bid_wall(&self) -> bool {
        self.bid_walls
            .iter()
            .any(|w| w.strength >= WallStrength::Strong)
    }

    pub fn has_strong_ask_wall(&self) -> bool {
        self.ask_walls
            .iter()
            .any(|w| w.strength >= WallStrength::Strong)
    }
}

/// Orderbook analyzer over one snapshot.
#[derive(Debug, Clone, Default)]
pub struct OrderbookAnalyzer {
    config: OrderbookConfig,
}

impl OrderbookAnalyzer {
    pub fn new(config: OrderbookConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, snapshot: &MarketSnapshot) -> Result<OrderbookReport> {
        let cfg = &self.config;
        let book = &snapshot.orderbook;
        if book.bids.is_empty() || book.asks.is_empty() {
            return Err(AnalyzerError::EmptyOrderbook);
        }

        let spread_pct = book.spread_pct().unwrap_or(f64::MAX);
        let spread_ok = spread_pct <= cfg.max_spread_pct;

        let bid_depth_usd = book.bid_depth_usd(cfg.depth_band_pct);
        let ask_depth_usd = book.ask_depth_usd(cfg.depth_band_pct);
        let total_depth = bid_depth_usd + ask_depth_usd;
        let imbalance = if total_depth > 0.0 {
            (bid_depth_usd - ask_depth_usd) / total_depth
        } else {
            0.0
        };

        let mid = book.mid_price().unwrap_or(0.0);
        let bid_walls = find_walls(&book.bids, WallSide::Bid, mid, cfg);
        let ask_walls = find_walls(&book.asks, WallSide::Ask, mid, cfg);

        let liquidity_score = liquidity_score(total_depth, spread_pct);

        // Imbalance past 10% of depth reads directional.
        let lean = if imbalance > 0.1 {
            Lean::Bullish
        } else if imbalance < -0.1 {
            Lean::Bearish
        } else {
            Lean::Neutral
        };

        Ok(OrderbookReport {
            lean,
            imbalance,
            bid_depth_usd,
            ask_depth_usd,
            spread_pct,
            spread_ok,
            liquidity_score,
            bid_walls,
            ask_walls,
        })
    }
}

fn find_walls(
    levels: &[OrderbookLevel],
    side: WallSide,
    mid: f64,
    cfg: &OrderbookConfig,
) -> Vec<Wall> {
    let scan = &levels[..levels.len().min(cfg.wall_scan_levels)];
    if scan.is_empty() || mid <= 0.0 {
        return Vec::new();
    }

    let notionals: Vec<f64> = scan
        .iter()
        .map(|l| l.price.to_f64() * l.qty.to_f64())
        .collect();
    let mean_notional = notionals.iter().sum::<f64>() / notionals.len() as f64;
    if mean_notional <= 0.0 {
        return Vec::new();
    }

    let mut walls: Vec<Wall> = scan
        .iter()
        .zip(&notionals)
        .filter(|(_, n)| **n > mean_notional * cfg.wall_multiple)
        .map(|(level, n)| {
            let price = level.price.to_f64();
            let strength = if *n > mean_notional * 10.0 {
                WallStrength::VeryStrong
            } else if *n > mean_notional * 6.0 {
                WallStrength::Strong
            } else {
                WallStrength::Moderate
            };
            Wall {
                side,
                price,
                notional_usd: *n,
                distance_pct: (price - mid).abs() / mid * 100.0,
                strength,
            }
        })
        .collect();

    walls.sort_by(|a, b| b.notional_usd.total_cmp(&a.notional_usd));
    walls.truncate(3);
    walls
}

fn liquidity_score(total_depth_usd: f64, spread_pct: f64) -> f64 {
    let mut score: f64 = 50.0;

    if total_depth_usd >= 500_000.0 {
        score += 30.0;
    } else if total_depth_usd >= 200_000.0 {
        score += 20.0;
    } else if total_depth_usd >= 100_000.0 {
        score += 10.0;
    } else if total_depth_usd < 50_000.0 {
        score -= 30.0;
    }

    if spread_pct < 0.1 {
        score += 20.0;
    } else if spread_pct < 0.3 {
        score += 10.0;
    } else if spread_pct > 1.0 {
        score -= 20.0;
    }

    score.clamp(0.0, 100.0)
}
