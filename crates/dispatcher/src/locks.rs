//! KeyedLocks - per-key async mutual exclusion

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slots = HashMap<String, Arc<AsyncMutex<()>>>;

/// Serializes multi-step store sequences on the same key.
///
/// Clones share the same key space. A key's entry lives only while some
/// caller holds or awaits its lock.
#[derive(Debug, Clone, Default)]
pub struct KeyedLocks {
    slots: Arc<Mutex<Slots>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `key` is free and hold it until the guard drops
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let slot = Arc::clone(self.slots().entry(key.to_string()).or_default());
        let guard = Arc::clone(&slot).lock_owned().await;
        KeyGuard {
            key: key.to_string(),
            slots: Arc::clone(&self.slots),
            slot,
            guard: Some(guard),
        }
    }

    /// Keys currently held or awaited
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive hold on one key
pub struct KeyGuard {
    key: String,
    slots: Arc<Mutex<Slots>>,
    slot: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // map entry + this guard's handle: nobody else is waiting
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
    }
}
