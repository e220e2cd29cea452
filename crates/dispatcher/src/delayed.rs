//! Trailing delivery for throttled events
//!
//! A throttled destination with trailing enabled persists the event under a
//! payload key and arms one timer for the rest of the window. Newer events
//! arriving while the timer is pending replace the stored payload (last
//! writer wins on `control.ts`); when the timer fires the stored payload is
//! taken from the store and sent through the normal send path.
//!
//! Every read-compare-write on a payload key runs under that key's lock, so
//! overlapping dispatches for the same (event, destination) observe each
//! other's writes and arm at most one timer.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use contracts::{Destination, DocumentStoreMappings, IncomingEvent, Store};
use observability::DeliveryOutcome;
use tracing::{debug, info, instrument, warn};

use crate::customizer::DocumentCache;
use crate::dispatcher::DispatchContext;
use crate::error::{DispatcherError, FailureKind};

/// Purpose suffix separating payload keys from throttle keys
pub const PAYLOAD_KEY_SUFFIX: &str = "-data";

/// Key of the stored trailing payload for (event, destination)
pub fn payload_key(store: &dyn Store, event: &IncomingEvent, destination: &Destination) -> String {
    store.data_key(event, destination, "", PAYLOAD_KEY_SUFFIX)
}

/// Logical time of an incoming event; missing or unreadable means now
pub fn incoming_timestamp(event: &IncomingEvent) -> u64 {
    event.control_timestamp().unwrap_or_else(now_nanos)
}

/// Logical time of a stored event; missing or unreadable means oldest
pub fn stored_timestamp(event: &IncomingEvent) -> u64 {
    event.control_timestamp().unwrap_or(0)
}

fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Persist `event` for a trailing send and arm the timer if none is pending.
///
/// Returns `Trailing` when the payload was stored or replaced, `Suppressed`
/// when a newer payload is already pending.
#[instrument(
    name = "delayed_schedule_trailing",
    skip_all,
    fields(destination = %destination.name(), event_key = %event.key, remaining_ms = remaining.as_millis() as u64)
)]
pub(crate) async fn schedule_trailing(
    ctx: Arc<DispatchContext>,
    store: Arc<dyn Store>,
    mappings: Arc<DocumentStoreMappings>,
    event: &IncomingEvent,
    destination: &Destination,
    remaining: Duration,
) -> Result<DeliveryOutcome, DispatcherError> {
    let bookkeeping = |message: String| {
        DispatcherError::new(FailureKind::Bookkeeping, message, destination, event)
    };

    let key = payload_key(store.as_ref(), event, destination);
    let serialized = serde_json::to_string(event).map_err(|e| bookkeeping(e.to_string()))?;

    let _held = ctx.locks.lock(&key).await;
    let pending = store
        .get(&key)
        .await
        .map_err(|e| bookkeeping(e.to_string()))?;

    let replaced = match pending {
        Some(entry) => {
            let stored_ts = serde_json::from_str::<IncomingEvent>(&entry.value)
                .map(|stored| stored_timestamp(&stored))
                .unwrap_or(0);
            let incoming_ts = incoming_timestamp(event);
            if stored_ts > incoming_ts {
                debug!(key = %key, stored_ts, incoming_ts, "Skipping update on event data");
                return Ok(DeliveryOutcome::Suppressed);
            }

            store
                .update(&key, serialized.clone())
                .await
                .map_err(|e| bookkeeping(e.to_string()))?
        }
        None => false,
    };

    if replaced {
        debug!(key = %key, "Pending payload replaced");
        return Ok(DeliveryOutcome::Trailing);
    }

    store
        .set(&key, serialized, destination.config.throttle * 2)
        .await
        .map_err(|e| bookkeeping(e.to_string()))?;

    let scheduler = ctx.scheduler.clone();
    let destination = destination.clone();
    let armed_with = event.clone();
    scheduler.spawn_after(remaining, async move {
        fire(ctx, store, mappings, key, destination, armed_with).await;
    });
    debug!("Trailing timer armed");

    Ok(DeliveryOutcome::Trailing)
}

/// Timer body: take whatever payload is stored now and send it.
///
/// `armed_with` is the event that armed the timer, used only to attribute
/// bookkeeping failures.
#[instrument(
    name = "delayed_fire",
    skip_all,
    fields(destination = %destination.name(), key = %key)
)]
async fn fire(
    ctx: Arc<DispatchContext>,
    store: Arc<dyn Store>,
    mappings: Arc<DocumentStoreMappings>,
    key: String,
    destination: Destination,
    armed_with: IncomingEvent,
) {
    let taken = {
        let _held = ctx.locks.lock(&key).await;
        let taken = store.get(&key).await;
        store.remove(&key).await;
        taken
    };

    let entry = match taken {
        Ok(Some(entry)) => entry,
        Ok(None) => {
            warn!("Stored payload vanished before the trailing send");
            return;
        }
        Err(e) => {
            ctx.fail(DispatcherError::from_contract(&e, &destination, &armed_with));
            return;
        }
    };

    match serde_json::from_str::<IncomingEvent>(&entry.value) {
        Ok(event) => {
            let documents = DocumentCache::for_destinations(
                std::slice::from_ref(&destination),
                &mappings,
                &ctx.null_documents,
            );
            let outcome = ctx.deliver(&event, &destination, &documents).await.outcome;
            ctx.metrics.record(destination.name(), outcome);
            info!(outcome = outcome.as_str(), "Trailing send finished");
        }
        Err(e) => {
            ctx.fail(DispatcherError::new(
                FailureKind::Bookkeeping,
                format!("stored payload unreadable: {e}"),
                &destination,
                &armed_with,
            ));
        }
    }
}
