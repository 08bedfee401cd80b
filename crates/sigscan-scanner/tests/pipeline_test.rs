//! Full-pipeline integration tests over a fixture-backed gateway.
//!
//! Each test builds a `StaticGateway` with synthetic market data, runs
//! one or more scan cycles at controlled timestamps and asserts on the
//! cycle report and the in-memory sink. Candle series are shaped so a
//! single property is under test; everything else stays inside every
//! discovery and detector band.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use sigscan_core::{
    Candle, Direction, Exchange, HistoricalOutcome, Instrument, InstrumentKey, OrderbookLevel,
    OrderbookSnapshot, OutcomeKind, Price, Qty, TickerStats, Timeframe,
};
use sigscan_gateway::StaticGateway;
use sigscan_ml::{FALLBACK_VERSION, FEATURE_NAMES};
use sigscan_scanner::{
    AppConfig, Application, CycleOutcome, MemoryOutcomeStore, MemorySink, OutcomeStore,
};
use uuid::Uuid;

fn p(value: f64) -> Price {
    Price::from_f64(value).unwrap()
}

fn q(value: f64) -> Qty {
    Qty::from_f64(value).unwrap()
}

fn key(symbol: &str) -> InstrumentKey {
    InstrumentKey::new(Exchange::Mexc, symbol)
}

fn instrument(symbol: &str) -> Instrument {
    Instrument {
        key: key(symbol),
        base: symbol.trim_end_matches("USDT").to_string(),
        quote: "USDT".to_string(),
        listed_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        tradable: true,
    }
}

fn ticker(last: f64, end: DateTime<Utc>) -> TickerStats {
    TickerStats {
        last: p(last),
        high_24h: p(last * 1.03),
        low_24h: p(last * 0.97),
        quote_volume_24h: q(5_000_000.0),
        received_at: end,
    }
}

/// Candles from close series, one per `tf` step ending at `end`. Opens
/// chain from the previous close; wicks extend 0.05 past the body.
fn candles(tf: Timeframe, closes: &[f64], volumes: &[f64], end: DateTime<Utc>) -> Vec<Candle> {
    assert_eq!(closes.len(), volumes.len());
    let step = Duration::minutes(i64::from(tf.minutes()));
    let n = closes.len() as i64;
    closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (&close, &volume))| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timeframe: tf,
                open: p(open),
                high: p(open.max(close) + 0.05),
                low: p(open.min(close) - 0.05),
                close: p(close),
                volume: q(volume),
                close_time: end - step * ((n - 1 - i as i64) as i32),
            }
        })
        .collect()
}

/// Gently rising closes with a small alternation. Keeps the measured
/// daily volatility just above the discovery floor while the close
/// coefficient of variation stays under the consolidation calm bound.
fn calm_closes(n: usize, base: f64) -> Vec<f64> {
    (0..n)
        .map(|i| base + 0.08 * i as f64 + if i % 2 == 1 { 0.25 } else { 0.0 })
        .collect()
}

/// Irregular volumes. The repeating cycle keeps adjacent-candle
/// similarity well under the wash-trading threshold.
fn organic_volumes(n: usize) -> Vec<f64> {
    (0..n).map(|i| 40.0 + (i % 7) as f64 * 8.0).collect()
}

/// Ten levels a side around `mid`. Bids carry triple the ask quantity,
/// which reads as a bullish book without tripping the wall checks.
fn bid_heavy_book(mid: f64, end: DateTime<Utc>) -> OrderbookSnapshot {
    let bids = (0..10)
        .map(|i| OrderbookLevel::new(p(mid - 0.05 - 0.1 * i as f64), q(180.0)))
        .collect();
    let asks = (0..10)
        .map(|i| OrderbookLevel::new(p(mid + 0.05 + 0.1 * i as f64), q(60.0)))
        .collect();
    OrderbookSnapshot {
        bids,
        asks,
        received_at: end,
    }
}

/// Load one instrument with enough calm history on every timeframe to
/// clear discovery and all four analyzers.
fn seed_calm_instrument(gateway: &StaticGateway, symbol: &str, end: DateTime<Utc>) {
    let k = key(symbol);
    let m15 = calm_closes(96, 100.0);
    let last = *m15.last().unwrap();
    gateway.set_ticker(k.clone(), ticker(last, end));
    gateway.set_candles(
        k.clone(),
        Timeframe::M15,
        candles(Timeframe::M15, &m15, &organic_volumes(96), end),
    );
    for tf in [Timeframe::M5, Timeframe::H1, Timeframe::H4] {
        let closes = calm_closes(60, 100.0);
        gateway.set_candles(k.clone(), tf, candles(tf, &closes, &organic_volumes(60), end));
    }
    gateway.set_orderbook(k.clone(), bid_heavy_book(last, end));
    gateway.set_trades(k, vec![]);
}

fn app_with(
    gateway: StaticGateway,
    config: AppConfig,
    sink: Arc<MemorySink>,
) -> Application {
    Application::new(
        config,
        Arc::new(gateway),
        sink,
        Arc::new(MemoryOutcomeStore::new()),
    )
}

/// Composer settings relaxed below what the calm fixture scores, so the
/// consolidation and manipulation gates are what decide emission.
fn relaxed_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.composer.min_quality_score = 35.0;
    config.composer.risk.min_risk_reward = 0.5;
    config
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// A spread wider than the discovery bound keeps the instrument out of
/// the candidate set entirely.
#[tokio::test]
async fn test_wide_spread_rejected_at_discovery() {
    let now = t0();
    let gateway = StaticGateway::new();
    seed_calm_instrument(&gateway, "WIDEUSDT", now);
    // Overwrite the book with a 0.8% spread.
    let k = key("WIDEUSDT");
    gateway.set_orderbook(
        k.clone(),
        OrderbookSnapshot {
            bids: vec![OrderbookLevel::new(p(100.0), q(1000.0))],
            asks: vec![OrderbookLevel::new(p(100.8), q(1000.0))],
            received_at: now,
        },
    );
    gateway.set_instruments(vec![instrument("WIDEUSDT")]);

    let sink = Arc::new(MemorySink::new());
    let mut app = app_with(gateway, AppConfig::default(), sink.clone());
    let report = app.run_cycle(now).await.unwrap();

    assert_eq!(report.candidates, 0);
    assert_eq!(report.emitted, 0);
    assert!(sink.signals().is_empty());
    assert_eq!(report.outcome, CycleOutcome::Completed);
}

/// An instrument that clears discovery but lacks analyzer lookback is
/// skipped, not failed: the cycle completes and nothing is emitted.
#[tokio::test]
async fn test_short_history_is_skipped() {
    let now = t0();
    let gateway = StaticGateway::new();
    let k = key("NEWUSDT");
    let closes = calm_closes(10, 100.0);
    let last = *closes.last().unwrap();
    gateway.set_ticker(k.clone(), ticker(last, now));
    for tf in Timeframe::ALL {
        gateway.set_candles(
            k.clone(),
            tf,
            candles(tf, &closes, &organic_volumes(10), now),
        );
    }
    gateway.set_orderbook(k.clone(), bid_heavy_book(last, now));
    gateway.set_trades(k, vec![]);
    gateway.set_instruments(vec![instrument("NEWUSDT")]);

    let sink = Arc::new(MemorySink::new());
    let mut app = app_with(gateway, AppConfig::default(), sink.clone());
    let report = app.run_cycle(now).await.unwrap();

    assert_eq!(report.candidates, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.emitted, 0);
    assert_eq!(report.suppressed, 0);
    assert_eq!(report.gateway_failures, 0);
}

/// When most instruments fail at the gateway the cycle is reported
/// degraded, while the healthy instrument is still processed.
#[tokio::test]
async fn test_majority_gateway_failures_degrade_cycle() {
    let now = t0();
    let gateway = StaticGateway::new();
    seed_calm_instrument(&gateway, "OKUSDT", now);
    gateway.set_instruments(vec![
        instrument("OKUSDT"),
        instrument("DOWNUSDT"),
        instrument("GONEUSDT"),
    ]);
    gateway.fail_instrument(key("DOWNUSDT"));
    gateway.fail_instrument(key("GONEUSDT"));

    let sink = Arc::new(MemorySink::new());
    let mut app = app_with(gateway, AppConfig::default(), sink.clone());
    let report = app.run_cycle(now).await.unwrap();

    assert_eq!(report.outcome, CycleOutcome::Degraded);
    assert_eq!(report.gateway_failures, 2);
    assert_eq!(report.candidates, 1);
    // The healthy instrument still reached the composer.
    assert_eq!(report.emitted + report.suppressed, 1);
}

/// Nothing is emitted until an instrument has been calm for the full
/// stabilization window; once it has, the same data produces a signal.
#[tokio::test]
async fn test_consolidation_gates_until_stable() {
    let first = t0();
    let gateway = StaticGateway::new();
    seed_calm_instrument(&gateway, "CALMUSDT", first);
    gateway.set_instruments(vec![instrument("CALMUSDT")]);

    let sink = Arc::new(MemorySink::new());
    let mut app = app_with(gateway, relaxed_config(), sink.clone());

    let report = app.run_cycle(first).await.unwrap();
    assert_eq!(report.candidates, 1);
    assert_eq!(report.emitted, 0);
    assert_eq!(report.suppressed, 1);

    // One minute past the 120-minute window; calm the whole way.
    let second = first + Duration::minutes(121);
    let report = app.run_cycle(second).await.unwrap();
    assert_eq!(report.emitted, 1);
    assert_eq!(report.suppressed, 0);

    let signals = sink.signals();
    assert_eq!(signals.len(), 1);
    let signal = &signals[0];
    assert_eq!(signal.instrument, key("CALMUSDT"));
    assert_eq!(signal.direction, Direction::Long);
    assert!(signal.entry.is_positive());
    assert!(signal.validate().is_ok());
    // Stop distance is capped at 2% while TP1 sits 4% out.
    let entry = signal.entry.to_f64();
    let rr = (signal.tp1.to_f64() - entry).abs() / (entry - signal.stop_loss.to_f64()).abs();
    assert!(rr >= 2.0, "risk/reward {rr} under 2");
}

/// A late price ramp on heavy volume is flagged as a pump and blocks
/// emission even after the instrument had been stable.
#[tokio::test]
async fn test_pump_spike_blocks_emission() {
    let first = t0();
    let gateway = StaticGateway::new();
    let k = key("PUMPUSDT");

    // 80 flat candles, then a 16-candle ramp to +20% with the last five
    // candles carrying an order of magnitude more volume.
    let mut closes: Vec<f64> = (0..80)
        .map(|i| 100.0 + if i % 2 == 1 { 0.25 } else { 0.0 })
        .collect();
    for i in 1..=16 {
        closes.push(100.0 + 1.25 * i as f64);
    }
    let mut volumes = organic_volumes(91);
    volumes.extend([500.0; 5]);
    let last = *closes.last().unwrap();

    gateway.set_ticker(k.clone(), ticker(last, first));
    gateway.set_candles(
        k.clone(),
        Timeframe::M15,
        candles(Timeframe::M15, &closes, &volumes, first),
    );
    for tf in [Timeframe::M5, Timeframe::H1, Timeframe::H4] {
        let calm = calm_closes(60, 100.0);
        gateway.set_candles(k.clone(), tf, candles(tf, &calm, &organic_volumes(60), first));
    }
    gateway.set_orderbook(k.clone(), bid_heavy_book(last, first));
    gateway.set_trades(k, vec![]);
    gateway.set_instruments(vec![instrument("PUMPUSDT")]);

    let sink = Arc::new(MemorySink::new());
    let mut app = app_with(gateway, relaxed_config(), sink.clone());
    let report = app.run_cycle(first).await.unwrap();

    assert_eq!(report.candidates, 1);
    assert_eq!(report.emitted, 0);
    assert_eq!(report.suppressed, 1);
    assert!(sink.signals().is_empty());
}

/// A resolved signal with a win/loss label and its emission-time
/// feature vector.
fn resolved_outcome(symbol: &str, win: bool, seed: usize) -> HistoricalOutcome {
    let features = (0..FEATURE_NAMES.len())
        .map(|j| {
            let base = if win { 0.6 } else { 0.4 };
            base + ((seed + j) % 5) as f64 * 0.02
        })
        .collect();
    HistoricalOutcome {
        signal_id: Uuid::new_v4(),
        instrument: key(symbol),
        direction: Direction::Long,
        kind: if win {
            OutcomeKind::Tp1Hit
        } else {
            OutcomeKind::SlHit
        },
        quality_score: 75.0,
        features,
        realized_pct: if win { 4.0 } else { -2.0 },
        duration_min: 90,
        resolved_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
    }
}

/// Enough labeled outcomes retrain the scorer at the end of a cycle;
/// an unchanged outcome count must not retrain again.
#[tokio::test]
async fn test_labeled_outcomes_retrain_scorer_once() {
    let first = t0();
    let gateway = StaticGateway::new();
    seed_calm_instrument(&gateway, "CALMUSDT", first);
    gateway.set_instruments(vec![instrument("CALMUSDT")]);

    let outcomes = Arc::new(MemoryOutcomeStore::new());
    for i in 0..60 {
        outcomes.record(resolved_outcome("CALMUSDT", i % 3 != 0, i));
    }

    let sink = Arc::new(MemorySink::new());
    let mut app = Application::new(
        relaxed_config(),
        Arc::new(gateway),
        sink.clone(),
        outcomes.clone(),
    );

    // First cycle suppresses (not yet Stable) but retrains at its end.
    app.run_cycle(first).await.unwrap();
    let report = app.run_cycle(first + Duration::minutes(121)).await.unwrap();
    assert_eq!(report.emitted, 1);
    let version = sink.signals()[0]
        .model_version
        .clone()
        .expect("model version on signal");
    assert!(
        version.starts_with("linear-"),
        "expected trained model, got {version}"
    );

    // No outcomes resolved since the fit; the version string carries the
    // training timestamp, so a refit after this pause would change it.
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let report = app.run_cycle(first + Duration::minutes(242)).await.unwrap();
    assert_eq!(report.emitted, 1);
    assert_eq!(
        sink.signals()[1].model_version.as_deref(),
        Some(version.as_str())
    );
}

/// A fit that fails leaves the previous scorer in place; signals keep
/// carrying the rule-based fallback version.
#[tokio::test]
async fn test_failed_fit_keeps_fallback_scorer() {
    let first = t0();
    let gateway = StaticGateway::new();
    seed_calm_instrument(&gateway, "CALMUSDT", first);
    gateway.set_instruments(vec![instrument("CALMUSDT")]);

    let outcomes = Arc::new(MemoryOutcomeStore::new());
    for i in 0..49 {
        outcomes.record(resolved_outcome("CALMUSDT", i % 3 != 0, i));
    }
    // One labeled outcome with a truncated feature vector poisons the fit.
    let mut malformed = resolved_outcome("CALMUSDT", true, 49);
    malformed.features = vec![0.5; 3];
    outcomes.record(malformed);

    let sink = Arc::new(MemorySink::new());
    let mut app = Application::new(
        relaxed_config(),
        Arc::new(gateway),
        sink.clone(),
        outcomes.clone(),
    );

    app.run_cycle(first).await.unwrap();
    let report = app.run_cycle(first + Duration::minutes(121)).await.unwrap();
    assert_eq!(report.emitted, 1);
    assert_eq!(
        sink.signals()[0].model_version.as_deref(),
        Some(FALLBACK_VERSION)
    );
}

/// The same fixture replayed through a fresh pipeline produces the same
/// signal parameters. Only the id and timestamp differ between runs.
#[tokio::test]
async fn test_replayed_cycles_are_deterministic() {
    let first = t0();
    let mut produced = Vec::new();
    for _ in 0..2 {
        let gateway = StaticGateway::new();
        seed_calm_instrument(&gateway, "CALMUSDT", first);
        gateway.set_instruments(vec![instrument("CALMUSDT")]);

        let sink = Arc::new(MemorySink::new());
        let mut app = app_with(gateway, relaxed_config(), sink.clone());
        app.run_cycle(first).await.unwrap();
        let report = app.run_cycle(first + Duration::minutes(121)).await.unwrap();
        assert_eq!(report.emitted, 1);
        produced.push(sink.signals().remove(0));
    }

    let (a, b) = (&produced[0], &produced[1]);
    assert_eq!(a.direction, b.direction);
    assert_eq!(a.entry, b.entry);
    assert_eq!(a.tp1, b.tp1);
    assert_eq!(a.tp2, b.tp2);
    assert_eq!(a.tp3, b.tp3);
    assert_eq!(a.stop_loss, b.stop_loss);
    assert_eq!(a.leverage, b.leverage);
    assert!((a.quality_score - b.quality_score).abs() < 1e-9);
    assert_ne!(a.id, b.id);
}
