//! Request rate limiting.
//!
//! Token bucket limiter shared by all gateway callers. Keeps outbound
//! request volume under the exchange REST budget.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Token bucket limiter over a sliding window.
pub struct RequestLimiter {
    /// Maximum requests per window.
    max_requests: u32,
    /// Window size in seconds.
    window_secs: u64,
    /// Timestamps of recent requests.
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
}

impl RequestLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
            timestamps: Arc::new(Mutex::new(VecDeque::with_capacity(max_requests as usize))),
        }
    }

    /// Check if a request can be issued now.
    pub fn can_request(&self) -> bool {
        self.cleanup_old_timestamps();

        let timestamps = self.timestamps.lock();
        timestamps.len() < self.max_requests as usize
    }

    /// Record an issued request.
    pub fn record_request(&self) {
        self.cleanup_old_timestamps();

        let mut timestamps = self.timestamps.lock();
        timestamps.push_back(Instant::now());

        if timestamps.len() >= self.max_requests as usize {
            warn!(
                count = timestamps.len(),
                max = self.max_requests,
                "Approaching request rate limit"
            );
        }
    }

    /// Current request count in the window.
    pub fn current_count(&self) -> u32 {
        self.cleanup_old_timestamps();
        self.timestamps.lock().len() as u32
    }

    /// Remaining capacity in the window.
    pub fn remaining_capacity(&self) -> u32 {
        self.max_requests.saturating_sub(self.current_count())
    }

    /// Wait until a request slot is available.
    pub async fn wait_for_capacity(&self) {
        while !self.can_request() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    fn cleanup_old_timestamps(&self) {
        let window = Duration::from_secs(self.window_secs);
        let cutoff = Instant::now() - window;

        let mut timestamps = self.timestamps.lock();
        while timestamps.front().is_some_and(|&t| t < cutoff) {
            timestamps.pop_front();
        }
    }

    /// Reset limiter state.
    pub fn reset(&self) {
        self.timestamps.lock().clear();
    }
}
