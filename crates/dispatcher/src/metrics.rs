//! Destination metrics for observability

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use observability::DeliveryOutcome;

/// Outcome counters for a single destination
#[derive(Debug, Default)]
pub struct DestinationMetrics {
    /// Successful transport calls
    sent: AtomicU64,
    /// Failed sends
    failed: AtomicU64,
    /// Throttled events stored for a trailing send
    trailing: AtomicU64,
    /// Throttled events dropped (trailing disabled)
    suppressed: AtomicU64,
    /// Events vetoed by filters
    vetoed: AtomicU64,
    /// Sends handed to the detached delay path
    detached: AtomicU64,
}

impl DestinationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: DeliveryOutcome) {
        let counter = match outcome {
            DeliveryOutcome::Sent => &self.sent,
            DeliveryOutcome::Failed => &self.failed,
            DeliveryOutcome::Trailing => &self.trailing,
            DeliveryOutcome::Suppressed => &self.suppressed,
            DeliveryOutcome::Vetoed => &self.vetoed,
            DeliveryOutcome::Detached => &self.detached,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sent: self.sent(),
            failed: self.failed(),
            trailing: self.trailing.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            vetoed: self.vetoed.load(Ordering::Relaxed),
            detached: self.detached.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of destination metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub sent: u64,
    pub failed: u64,
    pub trailing: u64,
    pub suppressed: u64,
    pub vetoed: u64,
    pub detached: u64,
}

/// Metrics of every destination a dispatcher has touched
#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    by_destination: Mutex<HashMap<String, Arc<DestinationMetrics>>>,
}

impl DispatcherMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count locally and export to the metrics recorder
    pub fn record(&self, destination: &str, outcome: DeliveryOutcome) {
        self.destination(destination).record(outcome);
        observability::record_delivery(destination, outcome);
    }

    pub fn destination(&self, name: &str) -> Arc<DestinationMetrics> {
        let mut map = self
            .by_destination
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(map.entry(name.to_string()).or_default())
    }

    /// Snapshots sorted by destination name
    pub fn snapshot(&self) -> Vec<(String, MetricsSnapshot)> {
        let map = self
            .by_destination
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut snapshots: Vec<_> = map
            .iter()
            .map(|(name, metrics)| (name.clone(), metrics.snapshot()))
            .collect();
        snapshots.sort_by(|a, b| a.0.cmp(&b.0));
        snapshots
    }
}
