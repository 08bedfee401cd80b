//! Market data gateway trait.
//!
//! Trait-based abstraction over exchange REST endpoints. This allows for:
//! - Dependency injection for testing
//! - Separation of pipeline logic from transport
//! - Multiple exchange backends behind one interface

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use sigscan_core::{
    Candle, Instrument, InstrumentKey, OrderbookSnapshot, TickerStats, Timeframe, TradeTick,
};

use crate::error::{GatewayError, Result};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Read-only access to exchange market data.
///
/// Every method is a point-in-time fetch; implementations own batching,
/// pagination and transport details. Callers wrap calls in
/// [`crate::retry::with_retry`] when retries are wanted.
pub trait MarketDataGateway: Send + Sync {
    /// List all instruments the exchange currently serves.
    fn list_instruments(&self) -> BoxFuture<'_, Result<Vec<Instrument>>>;

    /// 24h rolling ticker statistics for one instrument.
    fn ticker<'a>(&'a self, key: &'a InstrumentKey) -> BoxFuture<'a, Result<TickerStats>>;

    /// Most recent candles for one timeframe, oldest first.
    fn candles<'a>(
        &'a self,
        key: &'a InstrumentKey,
        timeframe: Timeframe,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<Candle>>>;

    /// Current orderbook snapshot, best levels first.
    fn orderbook<'a>(
        &'a self,
        key: &'a InstrumentKey,
        depth: usize,
    ) -> BoxFuture<'a, Result<OrderbookSnapshot>>;

    /// Recent public trades, newest last.
    fn recent_trades<'a>(
        &'a self,
        key: &'a InstrumentKey,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<TradeTick>>>;
}

/// Arc wrapper for gateway trait objects.
pub type DynGateway = Arc<dyn MarketDataGateway>;

/// In-memory gateway backed by pre-loaded fixtures.
///
/// Used in tests and replay runs. Unset instruments return
/// `DataUnavailable`, which exercises the pipeline's per-instrument
/// error isolation.
#[derive(Default)]
pub struct StaticGateway {
    instruments: Mutex<Vec<Instrument>>,
    tickers: Mutex<HashMap<InstrumentKey, TickerStats>>,
    candles: Mutex<HashMap<(InstrumentKey, Timeframe), Vec<Candle>>>,
    orderbooks: Mutex<HashMap<InstrumentKey, OrderbookSnapshot>>,
    trades: Mutex<HashMap<InstrumentKey, Vec<TradeTick>>>,
    /// Keys that fail every fetch with a transport error.
    failing: Mutex<Vec<InstrumentKey>>,
}

impl StaticGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_instruments(&self, instruments: Vec<Instrument>) {
        *self.instruments.lock() = instruments;
    }

    pub fn set_ticker(&self, key: InstrumentKey, ticker: TickerStats) {
        self.tickers.lock().insert(key, ticker);
    }

    pub fn set_candles(&self, key: InstrumentKey, timeframe: Timeframe, candles: Vec<Candle>) {
        self.candles.lock().insert((key, timeframe), candles);
    }

    pub fn set_orderbook(&self, key: InstrumentKey, book: OrderbookSnapshot) {
        self.orderbooks.lock().insert(key, book);
    }

    pub fn set_trades(&self, key: InstrumentKey, trades: Vec<TradeTick>) {
        self.trades.lock().insert(key, trades);
    }

    /// Mark a key so every fetch for it fails with a transport error.
    pub fn fail_instrument(&self, key: InstrumentKey) {
        self.failing.lock().push(key);
    }

    fn check_failing(&self, key: &InstrumentKey) -> Result<()> {
        if self.failing.lock().contains(key) {
            return Err(GatewayError::Transport(format!(
                "injected failure for {key}"
            )));
        }
        Ok(())
    }
}

impl MarketDataGateway for StaticGateway {
    fn list_instruments(&self) -> BoxFuture<'_, Result<Vec<Instrument>>> {
        Box::pin(async move { Ok(self.instruments.lock().clone()) })
    }

    fn ticker<'a>(&'a self, key: &'a InstrumentKey) -> BoxFuture<'a, Result<TickerStats>> {
        Box::pin(async move {
            self.check_failing(key)?;
            self.tickers
                .lock()
                .get(key)
                .cloned()
                .ok_or_else(|| GatewayError::DataUnavailable {
                    symbol: key.symbol.clone(),
                    reason: "no ticker fixture".into(),
                })
        })
    }

    fn candles<'a>(
        &'a self,
        key: &'a InstrumentKey,
        timeframe: Timeframe,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<Candle>>> {
        Box::pin(async move {
            self.check_failing(key)?;
            let all = self
                .candles
                .lock()
                .get(&(key.clone(), timeframe))
                .cloned()
                .ok_or_else(|| GatewayError::DataUnavailable {
                    symbol: key.symbol.clone(),
                    reason: format!("no {timeframe} candle fixture"),
                })?;
            let start = all.len().saturating_sub(limit);
            Ok(all[start..].to_vec())
        })
    }

    fn orderbook<'a>(
        &'a self,
        key: &'a InstrumentKey,
        depth: usize,
    ) -> BoxFuture<'a, Result<OrderbookSnapshot>> {
        Box::pin(async move {
            self.check_failing(key)?;
            let mut book = self
                .orderbooks
                .lock()
                .get(key)
                .cloned()
                .ok_or_else(|| GatewayError::DataUnavailable {
                    symbol: key.symbol.clone(),
                    reason: "no orderbook fixture".into(),
                })?;
            book.bids.truncate(depth);
            book.asks.truncate(depth);
            Ok(book)
        })
    }

    fn recent_trades<'a>(
        &'a self,
        key: &'a InstrumentKey,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<TradeTick>>> {
        Box::pin(async move {
            self.check_failing(key)?;
            let all = self
                .trades
                .lock()
                .get(key)
                .cloned()
                .ok_or_else(|| GatewayError::DataUnavailable {
                    symbol: key.symbol.clone(),
                    reason: "no trade fixture".into(),
                })?;
            let start = all.len().saturating_sub(limit);
            Ok(all[start..].to_vec())
        })
    }
}
