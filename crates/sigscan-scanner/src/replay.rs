//! Replay fixtures.
//!
//! Loads a JSON capture of market data into a `StaticGateway` so the
//! scanner can run a full pipeline pass without live connectivity.
//! Candle batches carry their timeframe per candle and are grouped here.

use std::collections::BTreeMap;

use serde::Deserialize;
use sigscan_core::{
    Candle, Instrument, OrderbookSnapshot, TickerStats, Timeframe, TradeTick,
};
use sigscan_gateway::StaticGateway;

use crate::error::{AppError, AppResult};

/// One instrument's captured data.
#[derive(Debug, Deserialize)]
pub struct InstrumentFixture {
    pub instrument: Instrument,
    pub ticker: TickerStats,
    #[serde(default)]
    pub candles: Vec<Candle>,
    pub orderbook: OrderbookSnapshot,
    #[serde(default)]
    pub trades: Vec<TradeTick>,
}

/// Full replay file.
#[derive(Debug, Deserialize)]
pub struct ReplayFixture {
    pub instruments: Vec<InstrumentFixture>,
}

/// Build a fixture-backed gateway from a replay file.
pub fn load_gateway(path: &str) -> AppResult<StaticGateway> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("Failed to read replay file: {e}")))?;
    let fixture: ReplayFixture = serde_json::from_str(&content)
        .map_err(|e| AppError::Config(format!("Failed to parse replay file: {e}")))?;
    Ok(into_gateway(fixture))
}

fn into_gateway(fixture: ReplayFixture) -> StaticGateway {
    let gateway = StaticGateway::new();
    let mut instruments = Vec::with_capacity(fixture.instruments.len());
    for entry in fixture.instruments {
        let key = entry.instrument.key.clone();
        instruments.push(entry.instrument);
        gateway.set_ticker(key.clone(), entry.ticker);

        let mut by_timeframe: BTreeMap<Timeframe, Vec<Candle>> = BTreeMap::new();
        for candle in entry.candles {
            by_timeframe.entry(candle.timeframe).or_default().push(candle);
        }
        for (tf, mut candles) in by_timeframe {
            candles.sort_by_key(|c| c.close_time);
            gateway.set_candles(key.clone(), tf, candles);
        }

        gateway.set_orderbook(key.clone(), entry.orderbook);
        gateway.set_trades(key, entry.trades);
    }
    gateway.set_instruments(instruments);
    gateway
}
