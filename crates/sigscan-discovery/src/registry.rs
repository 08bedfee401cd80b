//! First-seen tracking for new-listing detection.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sigscan_core::{Instrument, InstrumentKey};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Tracks when each instrument was first observed.
///
/// The first observation after startup seeds the registry silently so a
/// cold start does not report the whole exchange as newly listed.
#[derive(Debug, Default)]
pub struct ListingRegistry {
    first_seen: DashMap<InstrumentKey, DateTime<Utc>>,
    bootstrapped: AtomicBool,
}

impl ListingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current universe and return the keys not seen before.
    pub fn observe(&self, instruments: &[Instrument], now: DateTime<Utc>) -> Vec<InstrumentKey> {
        let seeding = !self.bootstrapped.swap(true, Ordering::SeqCst);
        let mut new_keys = Vec::new();
        for instrument in instruments {
            if self.first_seen.contains_key(&instrument.key) {
                continue;
            }
            self.first_seen.insert(instrument.key.clone(), now);
            if !seeding {
                info!(instrument = %instrument.key, "New listing detected");
                new_keys.push(instrument.key.clone());
            }
        }
        new_keys
    }

    /// When the instrument was first observed by this process.
    pub fn first_seen(&self, key: &InstrumentKey) -> Option<DateTime<Utc>> {
        self.first_seen.get(key).map(|e| *e.value())
    }

    /// Minutes since first observation; None when never seen.
    pub fn observed_age_minutes(&self, key: &InstrumentKey, now: DateTime<Utc>) -> Option<i64> {
        self.first_seen(key).map(|seen| (now - seen).num_minutes())
    }

    pub fn len(&self) -> usize {
        self.first_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first_seen.is_empty()
    }
}
