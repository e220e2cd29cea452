//! Delivery metrics
//!
//! Prometheus counters per destination outcome, plus an in-memory
//! aggregator used for end-of-run summaries.

use metrics::{counter, histogram};
use std::collections::BTreeMap;

/// What happened to one (event, destination) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeliveryOutcome {
    /// Transport call succeeded
    Sent,
    /// Transport call or resolution failed
    Failed,
    /// Throttled, payload stored for a trailing send
    Trailing,
    /// Throttled with trailing disabled, event dropped
    Suppressed,
    /// Vetoed by a filter or middleware
    Vetoed,
    /// Handed to a fire-and-forget delayed send
    Detached,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Trailing => "trailing",
            Self::Suppressed => "suppressed",
            Self::Vetoed => "vetoed",
            Self::Detached => "detached",
        }
    }
}

/// Record an event accepted for dispatch
pub fn record_event_received(event_key: &str, source: &str) {
    counter!(
        "captin_events_received_total",
        "event_key" => event_key.to_string(),
        "source" => source.to_string()
    )
    .increment(1);
}

/// Record the fan-out width of one dispatch
pub fn record_fanout(destinations: usize) {
    histogram!("captin_dispatch_fanout").record(destinations as f64);
}

/// Record one destination outcome
pub fn record_delivery(destination: &str, outcome: DeliveryOutcome) {
    counter!(
        "captin_deliveries_total",
        "destination" => destination.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record transport latency
pub fn record_send_latency_ms(destination: &str, latency_ms: f64) {
    histogram!(
        "captin_send_latency_ms",
        "destination" => destination.to_string()
    )
    .record(latency_ms);
}

/// In-memory outcome aggregation for summaries
#[derive(Debug, Clone, Default)]
pub struct DeliveryAggregator {
    outcomes: BTreeMap<String, BTreeMap<DeliveryOutcome, u64>>,
    latency: LatencyStats,
}

impl DeliveryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, destination: &str, outcome: DeliveryOutcome) {
        *self
            .outcomes
            .entry(destination.to_string())
            .or_default()
            .entry(outcome)
            .or_insert(0) += 1;
    }

    pub fn record_latency_ms(&mut self, latency_ms: f64) {
        self.latency.push(latency_ms);
    }

    /// Count of `outcome` for `destination`
    pub fn count(&self, destination: &str, outcome: DeliveryOutcome) -> u64 {
        self.outcomes
            .get(destination)
            .and_then(|by_outcome| by_outcome.get(&outcome))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self, outcome: DeliveryOutcome) -> u64 {
        self.outcomes
            .values()
            .filter_map(|by_outcome| by_outcome.get(&outcome))
            .sum()
    }

    pub fn latency(&self) -> &LatencyStats {
        &self.latency
    }
}

impl std::fmt::Display for DeliveryAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Delivery Summary ===")?;
        for (destination, by_outcome) in &self.outcomes {
            let parts: Vec<String> = by_outcome
                .iter()
                .map(|(outcome, count)| format!("{}={}", outcome.as_str(), count))
                .collect();
            writeln!(f, "{}: {}", destination, parts.join(", "))?;
        }
        writeln!(f, "Send latency (ms): {}", self.latency)
    }
}

/// Running min / max / mean of send latencies
#[derive(Debug, Clone, Default)]
pub struct LatencyStats {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl LatencyStats {
    pub fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

impl std::fmt::Display for LatencyStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3} (n={})",
                self.min,
                self.max,
                self.mean(),
                self.count
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_stats() {
        let mut stats = LatencyStats::default();
        for v in [4.0, 1.0, 7.0] {
            stats.push(v);
        }
        assert_eq!(stats.count(), 3);
        assert!((stats.mean() - 4.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 7.0).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_counts() {
        let mut aggregator = DeliveryAggregator::new();
        aggregator.record("one", DeliveryOutcome::Sent);
        aggregator.record("one", DeliveryOutcome::Sent);
        aggregator.record("two", DeliveryOutcome::Failed);
        aggregator.record("two", DeliveryOutcome::Sent);

        assert_eq!(aggregator.count("one", DeliveryOutcome::Sent), 2);
        assert_eq!(aggregator.count("one", DeliveryOutcome::Failed), 0);
        assert_eq!(aggregator.total(DeliveryOutcome::Sent), 3);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = DeliveryAggregator::new();
        aggregator.record("one", DeliveryOutcome::Suppressed);
        aggregator.record_latency_ms(12.5);

        let output = aggregator.to_string();
        assert!(output.contains("one: suppressed=1"));
        assert!(output.contains("n=1"));
    }
}
