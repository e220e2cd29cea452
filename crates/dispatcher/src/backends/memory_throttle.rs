//! MemoryThrottle - fixed-window gate in process memory

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use contracts::{ContractError, Throttle, ThrottleDecision};
use tokio::time::Instant;

/// Remembers when each key's window closes.
///
/// A key triggers when it never triggered before or its window has
/// elapsed; otherwise the remaining window is reported. Elapsed windows
/// are swept whenever a key triggers.
#[derive(Debug, Default)]
pub struct MemoryThrottle {
    reopens_at: Mutex<HashMap<String, Instant>>,
}

impl MemoryThrottle {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Throttle for MemoryThrottle {
    async fn can_trigger(&self, key: &str, window: Duration) -> Result<ThrottleDecision, ContractError> {
        if window.is_zero() {
            return Ok(ThrottleDecision::Trigger);
        }

        let now = Instant::now();
        let mut windows = self
            .reopens_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(&reopens_at) = windows.get(key) {
            if now < reopens_at {
                return Ok(ThrottleDecision::Wait(reopens_at - now));
            }
        }

        windows.retain(|_, reopens_at| *reopens_at > now);
        windows.insert(key.to_string(), now + window);
        Ok(ThrottleDecision::Trigger)
    }
}
