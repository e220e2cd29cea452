//! Store / Throttle traits - persistence for throttling and delayed payloads

use async_trait::async_trait;
use std::time::Duration;

use crate::{ContractError, Destination, IncomingEvent};

/// A persisted value and its remaining time to live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub value: String,
    pub ttl: Duration,
}

/// Key-value backend holding delayed payloads.
///
/// Must be safe for concurrent use by every destination task of one
/// dispatch and across overlapping dispatches.
#[async_trait]
pub trait Store: Send + Sync {
    /// Read a persisted value, `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<StoreEntry>, ContractError>;

    /// Create an entry
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<bool, ContractError>;

    /// Overwrite an existing entry, keeping its TTL
    async fn update(&self, key: &str, value: String) -> Result<bool, ContractError>;

    /// Best-effort delete
    async fn remove(&self, key: &str);

    /// Deterministic key derivation.
    ///
    /// Distinct `suffix` values must yield disjoint keys so throttle
    /// bookkeeping and payload storage never collide.
    fn data_key(
        &self,
        event: &IncomingEvent,
        destination: &Destination,
        prefix: &str,
        suffix: &str,
    ) -> String;
}

/// Outcome of a throttle check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Send now
    Trigger,
    /// Window still open for this long
    Wait(Duration),
}

/// Windowed send gate keyed by (event, destination)
#[async_trait]
pub trait Throttle: Send + Sync {
    async fn can_trigger(&self, key: &str, window: Duration) -> Result<ThrottleDecision, ContractError>;
}
