//! Discovery engine.
//!
//! One `scan` enumerates the universe, runs the ordered gates, and
//! returns surviving candidates plus rejection and failure detail. Only
//! the universe listing itself is fatal; every per-instrument fetch
//! error is isolated to that instrument.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sigscan_core::{Instrument, InstrumentKey, TickerStats, Timeframe};
use sigscan_gateway::{DynGateway, GatewayError, Result};
use tracing::{debug, info, warn};

use crate::filter::{FilterConfig, FilterReject, InstrumentFilter};
use crate::registry::ListingRegistry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    pub filter: FilterConfig,
    /// Orderbook depth requested for the spread/depth gates.
    pub orderbook_depth: usize,
    /// 15m candles requested for the volatility gate. 96 covers 24h.
    pub volatility_candles: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            orderbook_depth: 50,
            volatility_candles: 96,
        }
    }
}

/// An instrument that passed every gate this cycle.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub instrument: Instrument,
    pub ticker: TickerStats,
    /// Daily volatility measured by the filter, percent.
    pub volatility_pct: f64,
    /// First seen by this process during this cycle.
    pub is_new_listing: bool,
}

/// Everything one discovery pass produced.
#[derive(Debug, Default)]
pub struct DiscoveryOutcome {
    pub candidates: Vec<Candidate>,
    /// Keys first observed this cycle, gated or not.
    pub new_listings: Vec<InstrumentKey>,
    pub rejections: Vec<(InstrumentKey, FilterReject)>,
    pub failures: Vec<(InstrumentKey, GatewayError)>,
}

pub struct DiscoveryEngine {
    gateway: DynGateway,
    filter: InstrumentFilter,
    registry: ListingRegistry,
    config: DiscoveryConfig,
}

impl DiscoveryEngine {
    pub fn new(gateway: DynGateway, config: DiscoveryConfig) -> Self {
        Self {
            gateway,
            filter: InstrumentFilter::new(config.filter.clone()),
            registry: ListingRegistry::new(),
            config,
        }
    }

    /// Run one discovery pass at `now`.
    pub async fn scan(&self, now: DateTime<Utc>) -> Result<DiscoveryOutcome> {
        let instruments = self.gateway.list_instruments().await?;
        let new_listings = self.registry.observe(&instruments, now);

        let mut outcome = DiscoveryOutcome {
            new_listings: new_listings.clone(),
            ..Default::default()
        };

        for instrument in instruments {
            let key = instrument.key.clone();
            if let Err(reject) = self.filter.check_instrument(&instrument) {
                debug!(instrument = %key, %reject, "Instrument gated");
                outcome.rejections.push((key, reject));
                continue;
            }

            match self.evaluate(&instrument).await {
                Ok(Ok((ticker, volatility_pct))) => {
                    outcome.candidates.push(Candidate {
                        is_new_listing: new_listings.contains(&key),
                        instrument,
                        ticker,
                        volatility_pct,
                    });
                }
                Ok(Err(reject)) => {
                    debug!(instrument = %key, %reject, "Instrument gated");
                    outcome.rejections.push((key, reject));
                }
                Err(err) => {
                    warn!(instrument = %key, error = %err, "Discovery fetch failed");
                    outcome.failures.push((key, err));
                }
            }
        }

        info!(
            candidates = outcome.candidates.len(),
            rejected = outcome.rejections.len(),
            failed = outcome.failures.len(),
            new_listings = outcome.new_listings.len(),
            "Discovery pass complete"
        );
        Ok(outcome)
    }

    /// Data-dependent gates for one instrument, in spec order. The outer
    /// Result is transport failure, the inner one a gate rejection.
    async fn evaluate(
        &self,
        instrument: &Instrument,
    ) -> Result<std::result::Result<(TickerStats, f64), FilterReject>> {
        let ticker = self.gateway.ticker(&instrument.key).await?;
        if let Err(reject) = self.filter.check_ticker(&ticker) {
            return Ok(Err(reject));
        }

        let candles = self
            .gateway
            .candles(&instrument.key, Timeframe::M15, self.config.volatility_candles)
            .await?;
        let closes: Vec<f64> = candles.iter().map(|c| c.close.to_f64()).collect();
        let volatility_pct = match self.filter.check_volatility(&closes) {
            Ok(v) => v,
            Err(reject) => return Ok(Err(reject)),
        };

        let book = self
            .gateway
            .orderbook(&instrument.key, self.config.orderbook_depth)
            .await?;
        if let Err(reject) = self.filter.check_orderbook(&book) {
            return Ok(Err(reject));
        }

        Ok(Ok((ticker, volatility_pct)))
    }
}
