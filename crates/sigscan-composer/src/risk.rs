//! Target, stop and leverage mathematics.
//!
//! All price math runs on f64 and converts back to `Price` at the
//! composition boundary. Functions are direction-symmetric: the long
//! formulas are written out and shorts mirror through `Direction::sign`.

use serde::{Deserialize, Serialize};
use sigscan_analyzers::TechnicalReport;
use sigscan_core::Direction;
use sigscan_manipulation::RiskLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// TP distances from entry, percent.
    pub tp1_pct: f64,
    pub tp2_pct: f64,
    pub tp3_pct: f64,
    /// Quality score at which TP2/TP3 stretch.
    pub stretch_score: f64,
    pub tp2_stretch: f64,
    pub tp3_stretch: f64,
    /// Hard cap on stop-loss distance from entry, percent.
    pub max_sl_distance_pct: f64,
    /// Price offset past the invalidated level, as a fraction.
    pub sl_level_offset: f64,
    pub min_leverage: u32,
    pub max_leverage: u32,
    pub min_risk_reward: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            tp1_pct: 4.0,
            tp2_pct: 8.0,
            tp3_pct: 12.0,
            stretch_score: 90.0,
            tp2_stretch: 1.2,
            tp3_stretch: 1.3,
            max_sl_distance_pct: 2.0,
            sl_level_offset: 0.005,
            min_leverage: 20,
            max_leverage: 500,
            min_risk_reward: 2.0,
        }
    }
}

/// TP1/TP2/TP3 from entry.
///
/// TP1 is always the configured minimum gain. TP2/TP3 take the nearest
/// resistance (long) or support (short) when that is more conservative
/// than the configured multiple; a score at or above `stretch_score`
/// stretches the configured TP2/TP3 distances instead. Ordering is
/// re-established by nudging when an override collapses it.
pub fn take_profits(
    direction: Direction,
    entry: f64,
    quality_score: f64,
    technical: &TechnicalReport,
    config: &RiskConfig,
) -> (f64, f64, f64) {
    let sign = direction.sign();
    let stretch = quality_score >= config.stretch_score;
    let tp2_pct = config.tp2_pct * if stretch { config.tp2_stretch } else { 1.0 };
    let tp3_pct = config.tp3_pct * if stretch { config.tp3_stretch } else { 1.0 };

    let tp1 = entry * (1.0 + sign * config.tp1_pct / 100.0);
    let mut tp2 = entry * (1.0 + sign * tp2_pct / 100.0);
    let mut tp3 = entry * (1.0 + sign * tp3_pct / 100.0);

    let barrier = |beyond: f64| -> Option<f64> {
        match direction {
            Direction::Long => technical.nearest_resistance(beyond),
            Direction::Short => technical.nearest_support(beyond),
        }
    };

    // More conservative means closer to entry.
    if let Some(level) = barrier(tp1) {
        if (level - tp2) * sign < 0.0 {
            tp2 = level;
        }
    }
    if let Some(level) = barrier(tp2) {
        if (level - tp3) * sign < 0.0 {
            tp3 = level;
        }
    }

    if (tp3 - tp2) * sign <= 0.0 {
        tp3 = tp2 * (1.0 + sign * 0.01);
    }
    (tp1, tp2, tp3)
}

/// Stop loss just past the nearest invalidated level, hard-capped at
/// `max_sl_distance_pct` from entry.
pub fn stop_loss(
    direction: Direction,
    entry: f64,
    technical: &TechnicalReport,
    config: &RiskConfig,
) -> f64 {
    let cap = entry * (1.0 - direction.sign() * config.max_sl_distance_pct / 100.0);
    let level = match direction {
        Direction::Long => technical
            .nearest_support(entry)
            .map(|s| s * (1.0 - config.sl_level_offset)),
        Direction::Short => technical
            .nearest_resistance(entry)
            .map(|r| r * (1.0 + config.sl_level_offset)),
    };
    match level {
        // Keep the level stop only while it is tighter than the cap.
        Some(stop) if (stop - cap) * direction.sign() > 0.0 => stop,
        _ => cap,
    }
}

/// Suggested leverage, monotonically non-increasing in volatility,
/// manipulation risk and quality shortfall.
pub fn leverage_for(
    volatility_pct: f64,
    quality_score: f64,
    risk: RiskLevel,
    config: &RiskConfig,
) -> u32 {
    let base: f64 = if volatility_pct > 15.0 {
        50.0
    } else if volatility_pct > 10.0 {
        100.0
    } else if volatility_pct > 5.0 {
        200.0
    } else {
        f64::from(config.max_leverage)
    };

    let quality_factor = if quality_score >= 90.0 {
        1.0
    } else if quality_score >= 80.0 {
        0.8
    } else if quality_score >= 70.0 {
        0.6
    } else {
        0.4
    };

    let risk_factor = match risk {
        RiskLevel::Low => 1.0,
        RiskLevel::Medium => 0.5,
        RiskLevel::High | RiskLevel::Extreme => 0.25,
    };

    let leverage = (base * quality_factor * risk_factor).round() as u32;
    leverage.clamp(config.min_leverage, config.max_leverage)
}

/// Rough time-to-TP1 in minutes: volatile instruments get there faster,
/// and a farther first target scales the estimate up.
pub fn estimated_duration_min(volatility_pct: f64, tp1_pct: f64) -> u32 {
    let base: f64 = if volatility_pct > 20.0 {
        60.0
    } else if volatility_pct > 10.0 {
        120.0
    } else if volatility_pct > 5.0 {
        240.0
    } else {
        480.0
    };
    (base * (tp1_pct / 4.0)).round().max(5.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigscan_analyzers::Lean;

    fn technical(supports: Vec<f64>, resistances: Vec<f64>) -> TechnicalReport {
        TechnicalReport {
            timeframes: Vec::new(),
            trend_score: 60.0,
            entry_score: 60.0,
            lean: Lean::Bullish,
            trend_strength: 5.0,
            supports,
            resistances,
        }
    }

    #[test]
    fn test_take_profits_default_distances() {
        let (tp1, tp2, tp3) = take_profits(
            Direction::Long,
            100.0,
            75.0,
            &technical(vec![], vec![]),
            &RiskConfig::default(),
        );
        assert!((tp1 - 104.0).abs() < 1e-9);
        assert!((tp2 - 108.0).abs() < 1e-9);
        assert!((tp3 - 112.0).abs() < 1e-9);
    }

    #[test]
    fn test_take_profits_stretch_at_high_score() {
        let (tp1, tp2, tp3) = take_profits(
            Direction::Long,
            100.0,
            92.0,
            &technical(vec![], vec![]),
            &RiskConfig::default(),
        );
        assert!((tp1 - 104.0).abs() < 1e-9);
        assert!((tp2 - 109.6).abs() < 1e-9);
        assert!((tp3 - 115.6).abs() < 1e-9);
    }

    #[test]
    fn test_resistance_pulls_tp2_in() {
        let report = technical(vec![], vec![106.0, 118.0]);
        let (tp1, tp2, tp3) =
            take_profits(Direction::Long, 100.0, 75.0, &report, &RiskConfig::default());
        assert!((tp1 - 104.0).abs() < 1e-9);
        assert!((tp2 - 106.0).abs() < 1e-9);
        // 118 is farther than the configured 112, so the multiple stays.
        assert!((tp3 - 112.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_resistance_keeps_ordering() {
        // Only one barrier: tp2 takes it, tp3 keeps the configured multiple.
        let report = technical(vec![], vec![106.0]);
        let (_, tp2, tp3) =
            take_profits(Direction::Long, 100.0, 75.0, &report, &RiskConfig::default());
        assert!((tp2 - 106.0).abs() < 1e-9);
        assert!((tp3 - 112.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_take_profits_mirror() {
        let report = technical(vec![94.5, 80.0], vec![]);
        let (tp1, tp2, tp3) =
            take_profits(Direction::Short, 100.0, 75.0, &report, &RiskConfig::default());
        assert!((tp1 - 96.0).abs() < 1e-9);
        assert!((tp2 - 94.5).abs() < 1e-9);
        assert!((tp3 - 88.0).abs() < 1e-9);
    }

    #[test]
    fn test_stop_loss_uses_near_support() {
        let report = technical(vec![99.0], vec![]);
        let stop = stop_loss(Direction::Long, 100.0, &report, &RiskConfig::default());
        // 99 * 0.995 = 98.505, inside the 2% cap.
        assert!((stop - 98.505).abs() < 1e-9);
    }

    #[test]
    fn test_stop_loss_capped_without_near_level() {
        let report = technical(vec![90.0], vec![]);
        let stop = stop_loss(Direction::Long, 100.0, &report, &RiskConfig::default());
        assert!((stop - 98.0).abs() < 1e-9);

        let report = technical(vec![], vec![110.0]);
        let stop = stop_loss(Direction::Short, 100.0, &report, &RiskConfig::default());
        assert!((stop - 102.0).abs() < 1e-9);
    }

    #[test]
    fn test_leverage_tiers() {
        let config = RiskConfig::default();
        assert_eq!(leverage_for(3.0, 92.0, RiskLevel::Low, &config), 500);
        assert_eq!(leverage_for(3.0, 82.0, RiskLevel::Low, &config), 400);
        assert_eq!(leverage_for(8.0, 72.0, RiskLevel::Low, &config), 120);
        assert_eq!(leverage_for(12.0, 92.0, RiskLevel::Medium, &config), 50);
        assert_eq!(leverage_for(18.0, 65.0, RiskLevel::High, &config), 20);
    }

    #[test]
    fn test_duration_scales_with_volatility_and_target() {
        assert_eq!(estimated_duration_min(25.0, 4.0), 60);
        assert_eq!(estimated_duration_min(12.0, 4.0), 120);
        assert_eq!(estimated_duration_min(3.0, 4.0), 480);
        // Stretched target pushes the estimate out.
        assert_eq!(estimated_duration_min(12.0, 8.0), 240);
    }
}
