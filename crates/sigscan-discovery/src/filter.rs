//! Ordered filter gates.
//!
//! Gates run cheapest first: instrument metadata, then ticker, then
//! candle history, then the orderbook. The first failing gate wins and
//! its reason is recorded; later gates never run for that instrument.

use std::fmt;

use serde::{Deserialize, Serialize};
use sigscan_core::{Instrument, OrderbookSnapshot, TickerStats};

/// Filter thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Quote currencies eligible for scanning.
    pub allowed_quotes: Vec<String>,
    /// Minimum 24h quote volume in USD.
    pub min_quote_volume_24h: f64,
    /// Price band bounds in USD. Sub-satoshi pairs and four-figure
    /// majors are both out of scope for the signal universe.
    pub min_price: f64,
    pub max_price: f64,
    /// Daily volatility band, percent.
    pub min_volatility_pct: f64,
    pub max_volatility_pct: f64,
    /// Maximum bid/ask spread, percent.
    pub max_spread_pct: f64,
    /// Band around mid for the depth gate, percent.
    pub depth_band_pct: f64,
    /// Minimum notional on the thinner side within the band, USD.
    pub min_depth_usd: f64,
    /// Minimum 15m closes required to judge volatility.
    pub min_volatility_closes: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            allowed_quotes: vec!["USDT".to_string()],
            min_quote_volume_24h: 500_000.0,
            min_price: 0.00001,
            max_price: 100_000.0,
            min_volatility_pct: 2.0,
            max_volatility_pct: 50.0,
            max_spread_pct: 0.5,
            depth_band_pct: 2.0,
            min_depth_usd: 50_000.0,
            min_volatility_closes: 8,
        }
    }
}

/// Why an instrument was excluded this cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "gate")]
pub enum FilterReject {
    QuoteNotAllowed { quote: String },
    NotTradable,
    VolumeTooLow { quote_volume_24h: f64 },
    PriceOutOfBand { price: f64 },
    InsufficientHistory { closes: usize },
    VolatilityOutOfBand { volatility_pct: f64 },
    SpreadTooWide { spread_pct: f64 },
    EmptyOrderbook,
    DepthTooThin { depth_usd: f64 },
}

impl FilterReject {
    /// Stable gate name, used as a metric label.
    pub fn gate(&self) -> &'static str {
        match self {
            Self::QuoteNotAllowed { .. } => "quote_not_allowed",
            Self::NotTradable => "not_tradable",
            Self::VolumeTooLow { .. } => "volume_too_low",
            Self::PriceOutOfBand { .. } => "price_out_of_band",
            Self::InsufficientHistory { .. } => "insufficient_history",
            Self::VolatilityOutOfBand { .. } => "volatility_out_of_band",
            Self::SpreadTooWide { .. } => "spread_too_wide",
            Self::EmptyOrderbook => "empty_orderbook",
            Self::DepthTooThin { .. } => "depth_too_thin",
        }
    }
}

impl fmt::Display for FilterReject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuoteNotAllowed { quote } => write!(f, "quote {quote} not allowed"),
            Self::NotTradable => write!(f, "not tradable"),
            Self::VolumeTooLow { quote_volume_24h } => {
                write!(f, "24h volume {quote_volume_24h:.0} USD too low")
            }
            Self::PriceOutOfBand { price } => write!(f, "price {price} out of band"),
            Self::InsufficientHistory { closes } => {
                write!(f, "only {closes} closes of history")
            }
            Self::VolatilityOutOfBand { volatility_pct } => {
                write!(f, "volatility {volatility_pct:.1}% out of band")
            }
            Self::SpreadTooWide { spread_pct } => write!(f, "spread {spread_pct:.2}% too wide"),
            Self::EmptyOrderbook => write!(f, "empty orderbook"),
            Self::DepthTooThin { depth_usd } => {
                write!(f, "depth {depth_usd:.0} USD too thin")
            }
        }
    }
}

/// Stateless gate evaluation over fetched data.
#[derive(Debug, Clone, Default)]
pub struct InstrumentFilter {
    config: FilterConfig,
}

impl InstrumentFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Metadata-only gates, run before any per-instrument fetch.
    pub fn check_instrument(&self, instrument: &Instrument) -> Result<(), FilterReject> {
        if !self
            .config
            .allowed_quotes
            .iter()
            .any(|q| q == &instrument.quote)
        {
            return Err(FilterReject::QuoteNotAllowed {
                quote: instrument.quote.clone(),
            });
        }
        if !instrument.tradable {
            return Err(FilterReject::NotTradable);
        }
        Ok(())
    }

    /// Volume and price-band gates over the 24h ticker.
    pub fn check_ticker(&self, ticker: &TickerStats) -> Result<(), FilterReject> {
        let volume = ticker.quote_volume_24h.to_f64();
        if volume < self.config.min_quote_volume_24h {
            return Err(FilterReject::VolumeTooLow {
                quote_volume_24h: volume,
            });
        }
        let price = ticker.last.to_f64();
        if price < self.config.min_price || price > self.config.max_price {
            return Err(FilterReject::PriceOutOfBand { price });
        }
        Ok(())
    }

    /// Volatility-band gate over 15m closes. Returns the measured daily
    /// volatility on success so callers keep it without recomputing.
    pub fn check_volatility(&self, closes_15m: &[f64]) -> Result<f64, FilterReject> {
        if closes_15m.len() < self.config.min_volatility_closes {
            return Err(FilterReject::InsufficientHistory {
                closes: closes_15m.len(),
            });
        }
        let volatility_pct = sigscan_analyzers::indicators::daily_volatility_pct(closes_15m)
            .ok_or(FilterReject::InsufficientHistory {
                closes: closes_15m.len(),
            })?;
        if volatility_pct < self.config.min_volatility_pct
            || volatility_pct > self.config.max_volatility_pct
        {
            return Err(FilterReject::VolatilityOutOfBand { volatility_pct });
        }
        Ok(volatility_pct)
    }

    /// Spread and depth gates over a fresh orderbook snapshot.
    pub fn check_orderbook(&self, book: &OrderbookSnapshot) -> Result<(), FilterReject> {
        let spread_pct = book.spread_pct().ok_or(FilterReject::EmptyOrderbook)?;
        if spread_pct > self.config.max_spread_pct {
            return Err(FilterReject::SpreadTooWide { spread_pct });
        }
        let bid_depth = book.bid_depth_usd(self.config.depth_band_pct);
        let ask_depth = book.ask_depth_usd(self.config.depth_band_pct);
        let thin_side = bid_depth.min(ask_depth);
        if thin_side < self.config.min_depth_usd {
            return Err(FilterReject::DepthTooThin {
                depth_usd: thin_side,
            });
        }
        Ok(())
    }
}
