//! Application configuration.
//!
//! One immutable struct passed into every cycle. Every section has serde
//! defaults so a partial TOML file only overrides what it names.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sigscan_analyzers::{OrderbookConfig, PatternConfig, TechnicalConfig, VolumeConfig};
use sigscan_composer::ComposerConfig;
use sigscan_discovery::DiscoveryConfig;
use sigscan_gateway::RetryPolicy;
use sigscan_manipulation::{ConsolidationConfig, DetectorConfig};
use sigscan_ml::TrainConfig;
use std::time::Duration;

/// Shared request budget for one gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateBudgetConfig {
    /// Maximum requests per window. Default: 1200.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Window size in seconds. Default: 60.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_max_requests() -> u32 {
    1200
}

fn default_window_secs() -> u64 {
    60
}

impl Default for RateBudgetConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

/// Backoff settings for transient gateway errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first. Default: 3.
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry (ms). Default: 250.
    #[serde(default = "default_retry_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Ceiling for the doubled delay (ms). Default: 5000.
    #[serde(default = "default_retry_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    250
}

fn default_retry_max_delay_ms() -> u64 {
    5_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            base_delay_ms: default_retry_base_delay_ms(),
            max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Seconds between scan cycles. Default: 30.
    pub scan_interval_secs: u64,
    /// Per-cycle deadline (seconds); candidates whose fetches do not
    /// complete in time are dropped until the next cycle. Default: 25.
    pub cycle_deadline_secs: u64,
    /// Bounded fan-out across candidates. Default: 8.
    pub worker_pool_size: usize,
    /// Candles fetched per timeframe when building a snapshot. Default: 100.
    pub candle_limit: usize,
    /// Trades fetched per snapshot. Default: 100.
    pub trade_limit: usize,
    /// Fraction of gateway-failed instruments above which the cycle is
    /// reported degraded. Default: 0.5.
    pub degraded_failure_fraction: f64,

    pub rate_budget: RateBudgetConfig,
    pub retry: RetryConfig,
    pub discovery: DiscoveryConfig,
    pub technical: TechnicalConfig,
    pub volume: VolumeConfig,
    pub orderbook: OrderbookConfig,
    pub pattern: PatternConfig,
    pub detector: DetectorConfig,
    pub consolidation: ConsolidationConfig,
    pub composer: ComposerConfig,
    pub train: TrainConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 30,
            cycle_deadline_secs: 25,
            worker_pool_size: 8,
            candle_limit: 100,
            trade_limit: 100,
            degraded_failure_fraction: 0.5,
            rate_budget: RateBudgetConfig::default(),
            retry: RetryConfig::default(),
            discovery: DiscoveryConfig::default(),
            technical: TechnicalConfig::default(),
            volume: VolumeConfig::default(),
            orderbook: OrderbookConfig::default(),
            pattern: PatternConfig::default(),
            detector: DetectorConfig::default(),
            consolidation: ConsolidationConfig::default(),
            composer: ComposerConfig::default(),
            train: TrainConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        if self.worker_pool_size == 0 {
            return Err(AppError::Config("worker_pool_size must be > 0".into()));
        }
        if self.scan_interval_secs == 0 {
            return Err(AppError::Config("scan_interval_secs must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.degraded_failure_fraction) {
            return Err(AppError::Config(
                "degraded_failure_fraction must be in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}
