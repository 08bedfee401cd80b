//! Per-candidate snapshot assembly.
//!
//! Builds one immutable `MarketSnapshot` from gateway fetches. All
//! requests go through the shared rate budget; transient errors retry
//! with backoff at this boundary and nowhere above it.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sigscan_core::{InstrumentKey, MarketSnapshot, Timeframe};
use sigscan_gateway::{with_retry, DynGateway, RequestLimiter, Result, RetryPolicy};

/// Fetch sizes for one snapshot.
#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    pub candles: usize,
    pub orderbook_depth: usize,
    pub trades: usize,
}

/// Shared snapshot builder. One instance serves every worker; the rate
/// budget inside is the single arbitrated resource for the gateway.
pub struct SnapshotFetcher {
    gateway: DynGateway,
    limiter: Arc<RequestLimiter>,
    retry: RetryPolicy,
    limits: FetchLimits,
}

impl SnapshotFetcher {
    pub fn new(
        gateway: DynGateway,
        limiter: Arc<RequestLimiter>,
        retry: RetryPolicy,
        limits: FetchLimits,
    ) -> Self {
        Self {
            gateway,
            limiter,
            retry,
            limits,
        }
    }

    /// Fetch everything one candidate needs, in request order: ticker,
    /// candles per timeframe, orderbook, trade tape.
    pub async fn fetch(&self, key: &InstrumentKey, now: DateTime<Utc>) -> Result<MarketSnapshot> {
        let ticker = self
            .budgeted(|| self.gateway.ticker(key), "ticker")
            .await?;

        let mut candles = BTreeMap::new();
        for tf in Timeframe::ALL {
            let batch = self
                .budgeted(
                    || self.gateway.candles(key, tf, self.limits.candles),
                    "candles",
                )
                .await?;
            candles.insert(tf, batch);
        }

        let orderbook = self
            .budgeted(
                || self.gateway.orderbook(key, self.limits.orderbook_depth),
                "orderbook",
            )
            .await?;
        let trades = self
            .budgeted(
                || self.gateway.recent_trades(key, self.limits.trades),
                "trades",
            )
            .await?;

        Ok(MarketSnapshot {
            key: key.clone(),
            ticker,
            candles,
            orderbook,
            trades,
            captured_at: now,
        })
    }

    /// Every attempt, retries included, draws one token from the budget.
    async fn budgeted<T, F, Fut>(&self, mut op: F, label: &str) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        with_retry(self.retry, label, || {
            let attempt = op();
            async {
                self.limiter.wait_for_capacity().await;
                self.limiter.record_request();
                attempt.await
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sigscan_core::{Candle, Exchange, OrderbookSnapshot, Price, Qty, TickerStats};
    use sigscan_gateway::StaticGateway;

    fn key() -> InstrumentKey {
        InstrumentKey::new(Exchange::Mexc, "BTCUSDT")
    }

    fn seed(gateway: &StaticGateway) {
        gateway.set_ticker(
            key(),
            TickerStats {
                last: Price::new(dec!(100)),
                high_24h: Price::new(dec!(101)),
                low_24h: Price::new(dec!(99)),
                quote_volume_24h: Qty::new(dec!(900000)),
                received_at: Utc::now(),
            },
        );
        for tf in Timeframe::ALL {
            gateway.set_candles(
                key(),
                tf,
                vec![Candle {
                    timeframe: tf,
                    open: Price::new(dec!(100)),
                    high: Price::new(dec!(101)),
                    low: Price::new(dec!(99)),
                    close: Price::new(dec!(100)),
                    volume: Qty::new(dec!(10)),
                    close_time: Utc::now(),
                }],
            );
        }
        gateway.set_orderbook(key(), OrderbookSnapshot::new(vec![], vec![]));
        gateway.set_trades(key(), vec![]);
    }

    #[tokio::test]
    async fn test_fetch_builds_full_snapshot() {
        let gateway = StaticGateway::new();
        seed(&gateway);
        let limiter = Arc::new(RequestLimiter::new(100, 60));
        let fetcher = SnapshotFetcher::new(
            Arc::new(gateway),
            limiter.clone(),
            RetryPolicy::default(),
            FetchLimits {
                candles: 100,
                orderbook_depth: 50,
                trades: 100,
            },
        );

        let now = Utc::now();
        let snapshot = fetcher.fetch(&key(), now).await.unwrap();
        assert_eq!(snapshot.captured_at, now);
        assert_eq!(snapshot.candles.len(), 4);
        // ticker + 4 candle batches + orderbook + trades
        assert_eq!(limiter.current_count(), 7);
    }

    #[tokio::test]
    async fn test_fetch_propagates_missing_data() {
        let gateway = StaticGateway::new();
        let fetcher = SnapshotFetcher::new(
            Arc::new(gateway),
            Arc::new(RequestLimiter::new(100, 60)),
            RetryPolicy::default(),
            FetchLimits {
                candles: 100,
                orderbook_depth: 50,
                trades: 100,
            },
        );

        let err = fetcher.fetch(&key(), Utc::now()).await.unwrap_err();
        assert_eq!(err.kind(), "data_unavailable");
    }
}
