//! Durable store availability signal.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

/// Tracks consecutive durable-store failures across every writer and
/// reader in the engine. The store is reported degraded once the streak
/// reaches the threshold; any success clears it.
#[derive(Debug)]
pub struct StoreHealth {
    consecutive_failures: AtomicU32,
    total_failures: AtomicU64,
    /// Unix millis of the latest failure, 0 if none.
    last_failure_ms: AtomicU64,
    threshold: u32,
}

/// Serializable view of [`StoreHealth`].
#[derive(Debug, Clone, Serialize)]
pub struct StoreHealthSnapshot {
    /// `"ok"` or `"degraded"`.
    pub status: &'static str,
    /// Current failure streak.
    pub consecutive_failures: u32,
    /// Failures since start.
    pub total_failures: u64,
    /// Time of the latest failure.
    pub last_failure_at: Option<DateTime<Utc>>,
}

impl StoreHealth {
    /// Create a tracker that degrades after `threshold` consecutive failures.
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            total_failures: AtomicU64::new(0),
            last_failure_ms: AtomicU64::new(0),
            threshold: threshold.max(1),
        }
    }

    /// Record a successful store operation.
    pub fn record_success(&self) {
        let previous = self.consecutive_failures.swap(0, Ordering::SeqCst);
        if previous >= self.threshold {
            info!(failures = previous, "Durable store recovered");
        }
    }

    /// Record a failed store operation.
    pub fn record_failure(&self) {
        let streak = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        self.last_failure_ms
            .store(Utc::now().timestamp_millis().max(0) as u64, Ordering::Relaxed);
        if streak == self.threshold {
            error!(
                failures = streak,
                "Durable store unavailable, offline subscribers are not being notified"
            );
        }
    }

    /// Whether the failure streak has reached the threshold.
    pub fn is_degraded(&self) -> bool {
        self.consecutive_failures.load(Ordering::SeqCst) >= self.threshold
    }

    /// Snapshot for health endpoints.
    pub fn snapshot(&self) -> StoreHealthSnapshot {
        let last_ms = self.last_failure_ms.load(Ordering::Relaxed);
        StoreHealthSnapshot {
            status: if self.is_degraded() { "degraded" } else { "ok" },
            consecutive_failures: self.consecutive_failures.load(Ordering::SeqCst),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            last_failure_at: (last_ms > 0)
                .then(|| DateTime::from_timestamp_millis(last_ms as i64))
                .flatten(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degrades_at_threshold_and_recovers_on_success() {
        let health = StoreHealth::new(3);

        health.record_failure();
        health.record_failure();
        assert!(!health.is_degraded());

        health.record_failure();
        assert!(health.is_degraded());
        assert_eq!(health.snapshot().status, "degraded");
        assert!(health.snapshot().last_failure_at.is_some());

        health.record_success();
        assert!(!health.is_degraded());
        assert_eq!(health.snapshot().total_failures, 3);
    }

    #[test]
    fn interleaved_success_resets_streak() {
        let health = StoreHealth::new(2);
        health.record_failure();
        health.record_success();
        health.record_failure();
        assert!(!health.is_degraded());
    }
}
