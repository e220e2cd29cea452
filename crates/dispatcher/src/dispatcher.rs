//! Dispatcher - concurrent fan-out of one event to its destinations

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{
    Destination, DocumentStore, DocumentStoreMappings, Filter, IncomingEvent, Middleware, Store,
    Throttle, ThrottleDecision,
};
use observability::{record_fanout, record_send_latency_ms, DeliveryOutcome};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::backends::NullDocumentStore;
use crate::customizer::{customize_event, DocumentCache};
use crate::delayed;
use crate::error::{DispatcherError, ErrorCollector, FailureKind};
use crate::locks::KeyedLocks;
use crate::metrics::DispatcherMetrics;
use crate::registry::SenderRegistry;
use crate::scheduler::DetachedScheduler;
use crate::sift::sift;

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    destinations: Vec<Destination>,
    senders: SenderRegistry,
    filters: Vec<Arc<dyn Filter>>,
    middlewares: Vec<Arc<dyn Middleware>>,
    scheduler: Option<DetachedScheduler>,
    locks: Option<KeyedLocks>,
    errors: Option<ErrorCollector>,
    metrics: Option<Arc<DispatcherMetrics>>,
    null_documents: Option<Arc<dyn DocumentStore>>,
}

impl DispatcherBuilder {
    pub fn new(destinations: Vec<Destination>, senders: SenderRegistry) -> Self {
        Self {
            destinations,
            senders,
            filters: Vec::new(),
            middlewares: Vec::new(),
            scheduler: None,
            locks: None,
            errors: None,
            metrics: None,
            null_documents: None,
        }
    }

    pub fn filters(mut self, filters: Vec<Arc<dyn Filter>>) -> Self {
        self.filters = filters;
        self
    }

    pub fn middlewares(mut self, middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        self.middlewares = middlewares;
        self
    }

    /// Share timers with other dispatchers so they outlive this one
    pub fn scheduler(mut self, scheduler: DetachedScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Share payload-key locks with other dispatchers over the same store
    pub fn locks(mut self, locks: KeyedLocks) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Share the failure collection with other dispatchers
    pub fn errors(mut self, errors: ErrorCollector) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn metrics(mut self, metrics: Arc<DispatcherMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Document store used for keys missing from the dispatch mappings
    pub fn document_fallback(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.null_documents = Some(store);
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            destinations: self.destinations,
            ctx: Arc::new(DispatchContext {
                senders: self.senders,
                filters: self.filters,
                middlewares: self.middlewares,
                errors: self.errors.unwrap_or_default(),
                metrics: self.metrics.unwrap_or_default(),
                scheduler: self.scheduler.unwrap_or_default(),
                locks: self.locks.unwrap_or_default(),
                null_documents: self
                    .null_documents
                    .unwrap_or_else(|| Arc::new(NullDocumentStore)),
            }),
        }
    }
}

/// Collaborators shared by destination tasks and detached timers
pub(crate) struct DispatchContext {
    pub(crate) senders: SenderRegistry,
    pub(crate) filters: Vec<Arc<dyn Filter>>,
    pub(crate) middlewares: Vec<Arc<dyn Middleware>>,
    pub(crate) errors: ErrorCollector,
    pub(crate) metrics: Arc<DispatcherMetrics>,
    pub(crate) scheduler: DetachedScheduler,
    pub(crate) locks: KeyedLocks,
    pub(crate) null_documents: Arc<dyn DocumentStore>,
}

/// Outcome of one delivery attempt; latency only for synchronous sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Delivery {
    pub(crate) outcome: DeliveryOutcome,
    pub(crate) latency: Option<Duration>,
}

impl From<DeliveryOutcome> for Delivery {
    fn from(outcome: DeliveryOutcome) -> Self {
        Self {
            outcome,
            latency: None,
        }
    }
}

impl DispatchContext {
    pub(crate) fn fail(&self, err: DispatcherError) {
        self.errors.push(err);
    }

    /// customize -> sift -> resolve sender -> transport
    pub(crate) async fn deliver(
        &self,
        event: &IncomingEvent,
        destination: &Destination,
        documents: &DocumentCache,
    ) -> Delivery {
        debug!(destination = %destination.name(), "Preprocess payload and document");
        let mut customized = customize_event(event, destination, documents).await;

        let sifted = sift(
            &mut customized,
            vec![destination.clone()],
            &self.filters,
            &self.middlewares,
        );
        let Some(destination) = sifted.into_iter().next() else {
            info!(
                destination = %destination.name(),
                event = %event.trace_info(),
                "Event interrupted by dispatcher filters"
            );
            return DeliveryOutcome::Vetoed.into();
        };

        let sender = match self.senders.resolve(destination.sender_key()) {
            Ok(sender) => sender,
            Err(e) => {
                self.fail(DispatcherError::from_contract(&e, &destination, &customized));
                return DeliveryOutcome::Failed.into();
            }
        };

        let callback_url = destination.callback_url();
        let delay = destination.config.delay;
        if !delay.is_zero() {
            info!(
                destination = %destination.name(),
                delay_ms = delay.as_millis() as u64,
                "Event delayed"
            );
            self.scheduler.spawn_after(delay, async move {
                match sender.send_event(&customized, &destination).await {
                    Ok(()) => info!(
                        destination = %destination.name(),
                        callback_url = %callback_url,
                        "Event successfully sent"
                    ),
                    Err(e) => error!(
                        destination = %destination.name(),
                        callback_url = %callback_url,
                        error = %e,
                        "Delayed event failed"
                    ),
                }
            });
            return DeliveryOutcome::Detached.into();
        }

        let started = Instant::now();
        let result = sender.send_event(&customized, &destination).await;
        let latency = started.elapsed();
        record_send_latency_ms(destination.name(), latency.as_secs_f64() * 1000.0);

        let outcome = match result {
            Ok(()) => {
                info!(
                    destination = %destination.name(),
                    sender = sender.name(),
                    callback_url = %callback_url,
                    "Event successfully sent"
                );
                DeliveryOutcome::Sent
            }
            Err(e) => {
                self.fail(DispatcherError::from_contract(&e, &destination, &customized));
                DeliveryOutcome::Failed
            }
        };
        Delivery {
            outcome,
            latency: Some(latency),
        }
    }
}

/// What happened to one destination within a dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationReport {
    pub destination: String,
    pub outcome: DeliveryOutcome,
    /// Transport time of a synchronous send
    pub latency: Option<Duration>,
}

/// What one `dispatch` call decided for each destination
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    reports: Vec<DestinationReport>,
}

impl DispatchSummary {
    /// Outcome of the first destination called `destination`
    pub fn outcome(&self, destination: &str) -> Option<DeliveryOutcome> {
        self.reports
            .iter()
            .find(|r| r.destination == destination)
            .map(|r| r.outcome)
    }

    pub fn count(&self, outcome: DeliveryOutcome) -> usize {
        self.reports.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Outcomes in destination order
    pub fn iter(&self) -> impl Iterator<Item = (&str, DeliveryOutcome)> {
        self.reports
            .iter()
            .map(|r| (r.destination.as_str(), r.outcome))
    }

    /// Full reports in destination order
    pub fn reports(&self) -> &[DestinationReport] {
        &self.reports
    }
}

/// Fans one event out to a fixed destination list.
///
/// Failures are collected per destination and never abort the batch.
pub struct Dispatcher {
    destinations: Vec<Destination>,
    ctx: Arc<DispatchContext>,
}

impl Dispatcher {
    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    /// Deliver `event` to every destination.
    ///
    /// Returns once each destination has sent, been dropped or been handed
    /// to a detached timer. Timers are not awaited; see [`Dispatcher::settle`].
    #[instrument(
        name = "dispatcher_dispatch",
        skip_all,
        fields(event = %event.trace_info(), destinations = self.destinations.len())
    )]
    pub async fn dispatch(
        &self,
        event: &IncomingEvent,
        store: Arc<dyn Store>,
        throttle: Arc<dyn Throttle>,
        document_stores: &DocumentStoreMappings,
    ) -> DispatchSummary {
        record_fanout(self.destinations.len());

        let event = Arc::new(event.clone());
        let mappings = Arc::new(document_stores.clone());
        let documents = Arc::new(DocumentCache::for_destinations(
            &self.destinations,
            &mappings,
            &self.ctx.null_documents,
        ));

        let mut tasks = JoinSet::new();
        let mut by_task = HashMap::with_capacity(self.destinations.len());
        for (index, destination) in self.destinations.iter().enumerate() {
            let run = run_destination(
                Arc::clone(&self.ctx),
                Arc::clone(&store),
                Arc::clone(&throttle),
                Arc::clone(&mappings),
                Arc::clone(&documents),
                Arc::clone(&event),
                destination.clone(),
            );
            let handle = tasks.spawn(run);
            by_task.insert(handle.id(), index);
        }

        let mut deliveries: Vec<Option<Delivery>> = vec![None; self.destinations.len()];
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, delivery) = match joined {
                Ok((id, delivery)) => (id, Ok(delivery)),
                Err(e) => (e.id(), Err(e)),
            };
            let Some(index) = by_task.remove(&id) else {
                error!(task = %id, "Unattributed destination task");
                continue;
            };
            let destination = &self.destinations[index];
            let delivery = delivery.unwrap_or_else(|e| {
                self.ctx.fail(DispatcherError::new(
                    FailureKind::Internal,
                    format!("destination task aborted: {e}"),
                    destination,
                    &event,
                ));
                DeliveryOutcome::Failed.into()
            });
            self.ctx.metrics.record(destination.name(), delivery.outcome);
            deliveries[index] = Some(delivery);
        }

        DispatchSummary {
            reports: self
                .destinations
                .iter()
                .zip(deliveries)
                .filter_map(|(d, delivery)| {
                    delivery.map(|delivery| DestinationReport {
                        destination: d.name().to_string(),
                        outcome: delivery.outcome,
                        latency: delivery.latency,
                    })
                })
                .collect(),
        }
    }

    /// Copy of every failure recorded so far
    pub fn errors(&self) -> Vec<DispatcherError> {
        self.ctx.errors.snapshot()
    }

    /// Drain recorded failures
    pub fn take_errors(&self) -> Vec<DispatcherError> {
        self.ctx.errors.take()
    }

    pub fn metrics(&self) -> &DispatcherMetrics {
        &self.ctx.metrics
    }

    pub fn scheduler(&self) -> &DetachedScheduler {
        &self.ctx.scheduler
    }

    /// Wait for trailing timers and delayed sends armed so far
    pub async fn settle(&self) {
        self.ctx.scheduler.settle().await;
    }
}

async fn run_destination(
    ctx: Arc<DispatchContext>,
    store: Arc<dyn Store>,
    throttle: Arc<dyn Throttle>,
    mappings: Arc<DocumentStoreMappings>,
    documents: Arc<DocumentCache>,
    event: Arc<IncomingEvent>,
    destination: Destination,
) -> Delivery {
    let key = store.data_key(&event, &destination, "", "");
    let decision = match throttle.can_trigger(&key, destination.config.throttle).await {
        Ok(decision) => decision,
        Err(e) => {
            error!(
                destination = %destination.name(),
                key = %key,
                error = %e,
                "Throttle check failed, sending without throttling"
            );
            ThrottleDecision::Trigger
        }
    };

    match decision {
        ThrottleDecision::Trigger => ctx.deliver(&event, &destination, &documents).await,
        ThrottleDecision::Wait(_) if destination.config.throttle_trailing_disabled => {
            debug!(destination = %destination.name(), key = %key, "Throttled, trailing disabled");
            DeliveryOutcome::Suppressed.into()
        }
        ThrottleDecision::Wait(remaining) => {
            let scheduled = delayed::schedule_trailing(
                Arc::clone(&ctx),
                store,
                mappings,
                &event,
                &destination,
                remaining,
            )
            .await;
            match scheduled {
                Ok(outcome) => outcome.into(),
                Err(e) => {
                    warn!(destination = %destination.name(), "Trailing bookkeeping failed");
                    ctx.fail(e);
                    DeliveryOutcome::Failed.into()
                }
            }
        }
    }
}
