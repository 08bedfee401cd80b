//! Outbound collaborator seams.
//!
//! The pipeline does not know how signals are delivered or where
//! outcomes live; it talks to these traits only. Delivery happens at
//! the join point of each cycle, so implementations must not block for
//! long.

use parking_lot::Mutex;
use sigscan_core::{HistoricalOutcome, InstrumentKey, Signal};
use sigscan_ml::HitRateStats;
use tracing::info;

/// Receives emitted signals. Notification transport lives behind this.
pub trait SignalSink: Send + Sync {
    fn deliver(&self, signal: &Signal);
}

/// Read-back of realized outcomes recorded by the persistence
/// collaborator. The pipeline never writes outcome data itself; tests
/// and replay runs feed the in-memory store directly.
pub trait OutcomeStore: Send + Sync {
    fn record(&self, outcome: HistoricalOutcome);

    /// All resolved outcomes, oldest first.
    fn outcomes(&self) -> Vec<HistoricalOutcome>;

    /// Realized hit rate for one instrument. Expired outcomes carry no
    /// label and do not count.
    fn hit_stats(&self, key: &InstrumentKey) -> HitRateStats;
}

/// Sink that logs each signal. The default when no notification
/// transport is wired in.
#[derive(Debug, Default)]
pub struct LogSink;

impl SignalSink for LogSink {
    fn deliver(&self, signal: &Signal) {
        info!(
            id = %signal.id,
            instrument = %signal.instrument,
            direction = %signal.direction,
            entry = %signal.entry,
            tp1 = %signal.tp1,
            tp2 = %signal.tp2,
            tp3 = %signal.tp3,
            stop_loss = %signal.stop_loss,
            leverage = signal.leverage,
            quality_score = signal.quality_score,
            quality = %signal.quality,
            risk = %signal.risk,
            rationale = ?signal.rationale,
            "Signal emitted"
        );
    }
}

/// In-memory sink for tests and replay runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    signals: Mutex<Vec<Signal>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.signals.lock().clone()
    }
}

impl SignalSink for MemorySink {
    fn deliver(&self, signal: &Signal) {
        self.signals.lock().push(signal.clone());
    }
}

/// In-memory outcome store.
#[derive(Debug, Default)]
pub struct MemoryOutcomeStore {
    outcomes: Mutex<Vec<HistoricalOutcome>>,
}

impl MemoryOutcomeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutcomeStore for MemoryOutcomeStore {
    fn record(&self, outcome: HistoricalOutcome) {
        self.outcomes.lock().push(outcome);
    }

    fn outcomes(&self) -> Vec<HistoricalOutcome> {
        self.outcomes.lock().clone()
    }

    fn hit_stats(&self, key: &InstrumentKey) -> HitRateStats {
        let mut stats = HitRateStats::default();
        for outcome in self.outcomes.lock().iter() {
            if outcome.instrument != *key {
                continue;
            }
            if let Some(label) = outcome.kind.label() {
                stats.record(label > 0.5);
            }
        }
        stats
    }
}
