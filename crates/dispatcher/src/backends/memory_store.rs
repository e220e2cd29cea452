//! MemoryStore - TTL-bounded in-process key-value store

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use contracts::{ContractError, Destination, IncomingEvent, Store, StoreEntry};
use tokio::time::Instant;

#[derive(Debug)]
struct Slot {
    value: String,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Store backed by a mutex-guarded map. A zero TTL never expires.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, Slot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().values().filter(|slot| !slot.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<StoreEntry>, ContractError> {
        let now = Instant::now();
        let mut slots = self.lock();

        if slots.get(key).is_some_and(|slot| slot.is_expired(now)) {
            slots.remove(key);
            return Ok(None);
        }

        Ok(slots.get(key).map(|slot| StoreEntry {
            value: slot.value.clone(),
            ttl: slot
                .expires_at
                .map(|at| at.saturating_duration_since(now))
                .unwrap_or(Duration::ZERO),
        }))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<bool, ContractError> {
        let now = Instant::now();
        let expires_at = (!ttl.is_zero()).then(|| now + ttl);
        let mut slots = self.lock();
        slots.retain(|_, slot| !slot.is_expired(now));
        slots.insert(key.to_string(), Slot { value, expires_at });
        Ok(true)
    }

    async fn update(&self, key: &str, value: String) -> Result<bool, ContractError> {
        let now = Instant::now();
        match self.lock().get_mut(key) {
            Some(slot) if !slot.is_expired(now) => {
                slot.value = value;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove(&self, key: &str) {
        self.lock().remove(key);
    }

    fn data_key(
        &self,
        event: &IncomingEvent,
        destination: &Destination,
        prefix: &str,
        suffix: &str,
    ) -> String {
        format!(
            "{prefix}{}.{}.{}.{}{suffix}",
            event.key,
            destination.name(),
            event.target_type,
            event.target_id
        )
    }
}
