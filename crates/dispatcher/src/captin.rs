//! Captin - top-level entry point: validate, route, sift, dispatch

use std::collections::HashMap;
use std::sync::Arc;

use config_loader::ConfigurationMapper;
use contracts::{
    ContractError, DocumentStore, DocumentStoreMappings, EventSender, Filter, IncomingEvent,
    Middleware, Store, Throttle,
};
use observability::record_event_received;
use tracing::{info, instrument};

use crate::backends::{MemoryStore, MemoryThrottle};
use crate::dispatcher::{DispatchSummary, DispatcherBuilder};
use crate::error::{DispatcherError, ErrorCollector, ExecutionError};
use crate::filters::{ControlTimestampMiddleware, DesiredHookFilter, SourceFilter, ValidateFilter};
use crate::locks::KeyedLocks;
use crate::metrics::DispatcherMetrics;
use crate::registry::SenderRegistry;
use crate::scheduler::DetachedScheduler;
use crate::sift::sift;

/// Routes incoming events to their configured destinations.
///
/// Holds the collaborators shared across every `execute` call: timers armed
/// by one call keep running after it returns and report into the same
/// failure collection.
pub struct Captin {
    mapper: ConfigurationMapper,
    senders: SenderRegistry,
    store: Arc<dyn Store>,
    throttle: Arc<dyn Throttle>,
    document_stores: DocumentStoreMappings,
    filters: Vec<Arc<dyn Filter>>,
    middlewares: Vec<Arc<dyn Middleware>>,
    scheduler: DetachedScheduler,
    locks: KeyedLocks,
    errors: ErrorCollector,
    metrics: Arc<DispatcherMetrics>,
}

impl Captin {
    /// In-memory store and throttle, the http sender and the built-in filters
    pub fn new(mapper: ConfigurationMapper) -> Result<Self, ContractError> {
        Ok(Self {
            mapper,
            senders: SenderRegistry::with_default_http()?,
            store: Arc::new(MemoryStore::new()),
            throttle: Arc::new(MemoryThrottle::new()),
            document_stores: HashMap::new(),
            filters: vec![
                Arc::new(ValidateFilter),
                Arc::new(SourceFilter),
                Arc::new(DesiredHookFilter),
            ],
            middlewares: vec![Arc::new(ControlTimestampMiddleware)],
            scheduler: DetachedScheduler::new(),
            locks: KeyedLocks::new(),
            errors: ErrorCollector::new(),
            metrics: Arc::new(DispatcherMetrics::new()),
        })
    }

    /// Register transports, replacing any under the same key
    pub fn set_sender_mapping(&mut self, senders: HashMap<String, Arc<dyn EventSender>>) {
        for (key, sender) in senders {
            self.senders.register(key, sender);
        }
    }

    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = store;
        self
    }

    pub fn with_throttle(mut self, throttle: Arc<dyn Throttle>) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_document_store(mut self, key: impl Into<String>, store: Arc<dyn DocumentStore>) -> Self {
        self.document_stores.insert(key.into(), store);
        self
    }

    /// Replace the filter chain
    pub fn with_filters(mut self, filters: Vec<Arc<dyn Filter>>) -> Self {
        self.filters = filters;
        self
    }

    /// Replace the middleware chain
    pub fn with_middlewares(mut self, middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        self.middlewares = middlewares;
        self
    }

    pub fn senders(&self) -> &SenderRegistry {
        &self.senders
    }

    pub fn mapper(&self) -> &ConfigurationMapper {
        &self.mapper
    }

    /// Dispatch one event to every subscribed destination.
    ///
    /// # Errors
    /// `ExecutionError::InvalidEvent` when the event lacks a key, source or
    /// target. Destination failures are collected, see [`Captin::errors`].
    #[instrument(name = "captin_execute", skip_all, fields(event = %event.trace_info()))]
    pub async fn execute(&self, mut event: IncomingEvent) -> Result<DispatchSummary, ExecutionError> {
        validate_event(&event)?;
        record_event_received(&event.key, &event.source);

        let destinations = self.mapper.destinations_for(&event.key);
        let destinations = sift(&mut event, destinations, &self.filters, &self.middlewares);
        if destinations.is_empty() {
            info!(event_key = %event.key, "No destination for event");
            return Ok(DispatchSummary::default());
        }

        let dispatcher = DispatcherBuilder::new(destinations, self.senders.clone())
            .filters(self.filters.clone())
            .middlewares(self.middlewares.clone())
            .scheduler(self.scheduler.clone())
            .locks(self.locks.clone())
            .errors(self.errors.clone())
            .metrics(Arc::clone(&self.metrics))
            .build();

        Ok(dispatcher
            .dispatch(
                &event,
                Arc::clone(&self.store),
                Arc::clone(&self.throttle),
                &self.document_stores,
            )
            .await)
    }

    /// Failures from every execute call and fired timer so far
    pub fn errors(&self) -> Vec<DispatcherError> {
        self.errors.snapshot()
    }

    pub fn take_errors(&self) -> Vec<DispatcherError> {
        self.errors.take()
    }

    pub fn metrics(&self) -> &DispatcherMetrics {
        &self.metrics
    }

    /// Number of trailing timers and delayed sends still armed
    pub fn pending(&self) -> usize {
        self.scheduler.pending()
    }

    /// Wait for every armed timer and delayed send
    pub async fn settle(&self) {
        self.scheduler.settle().await;
    }
}

fn validate_event(event: &IncomingEvent) -> Result<(), ExecutionError> {
    if event.is_valid() {
        return Ok(());
    }

    let missing = [
        ("event_key", event.key.is_empty()),
        ("source", event.source.is_empty()),
        ("target_type", event.target_type.is_empty()),
        ("target_id", event.target_id.is_empty()),
    ]
    .into_iter()
    .filter_map(|(field, empty)| empty.then_some(field))
    .collect::<Vec<_>>();

    Err(ExecutionError::invalid_event(format!(
        "missing {}",
        missing.join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::senders::LogSender;
    use async_trait::async_trait;
    use contracts::{Configuration, Destination};
    use observability::DeliveryOutcome;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collecting {
        names: Mutex<Vec<String>>,
    }

    impl Collecting {
        fn names(&self) -> Vec<String> {
            let mut names = self.names.lock().unwrap().clone();
            names.sort();
            names
        }
    }

    #[async_trait]
    impl EventSender for Collecting {
        fn name(&self) -> &str {
            "collecting"
        }

        async fn send_event(
            &self,
            _event: &IncomingEvent,
            destination: &Destination,
        ) -> Result<(), ContractError> {
            self.names.lock().unwrap().push(destination.name().to_string());
            Ok(())
        }
    }

    fn config(name: &str, actions: &[&str]) -> Configuration {
        let mut config = Configuration::new(name);
        config.actions = actions.iter().map(|a| a.to_string()).collect();
        config.sender = "collecting".to_string();
        config
    }

    fn captin(configs: Vec<Configuration>) -> (Captin, Arc<Collecting>) {
        let collecting = Arc::new(Collecting::default());
        let mut captin = Captin::new(ConfigurationMapper::new(configs)).unwrap();
        let mut senders: HashMap<String, Arc<dyn EventSender>> = HashMap::new();
        senders.insert("collecting".to_string(), collecting.clone());
        captin.set_sender_mapping(senders);
        (captin, collecting)
    }

    fn event() -> IncomingEvent {
        IncomingEvent::new("product.update", "core").with_target("Product", "product_id")
    }

    #[tokio::test]
    async fn test_invalid_event_rejected() {
        let (captin, collecting) = captin(vec![config("a", &["*"])]);

        let err = captin
            .execute(IncomingEvent::new("product.update", ""))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "invalid incoming event: missing source, target_type, target_id"
        );
        assert!(collecting.names().is_empty());
        assert!(captin.errors().is_empty());
    }

    #[test]
    fn test_default_and_extra_senders() {
        let mut captin = Captin::new(ConfigurationMapper::default()).unwrap();
        assert_eq!(captin.senders().keys(), vec!["http"]);

        let mut senders: HashMap<String, Arc<dyn EventSender>> = HashMap::new();
        senders.insert("log".to_string(), Arc::new(LogSender::new("log")));
        captin.set_sender_mapping(senders);
        assert_eq!(captin.senders().keys(), vec!["http", "log"]);
    }

    #[tokio::test]
    async fn test_routes_by_action() {
        let (captin, collecting) = captin(vec![
            config("updates", &["product.update"]),
            config("everything", &["*"]),
            config("deletes", &["product.delete"]),
        ]);

        let summary = captin.execute(event()).await.unwrap();

        assert_eq!(summary.len(), 2);
        assert_eq!(collecting.names(), vec!["everything", "updates"]);
        assert_eq!(captin.metrics().destination("updates").sent(), 1);
    }

    #[tokio::test]
    async fn test_loopback_and_desired_hooks() {
        let mut own = config("core_hook", &["*"]);
        own.source = "core".to_string();
        let (captin, collecting) = captin(vec![own, config("a", &["*"]), config("b", &["*"])]);

        let summary = captin
            .execute(event().with_control("desired_hooks", json!(["a", "core_hook"])))
            .await
            .unwrap();

        assert_eq!(collecting.names(), vec!["a"]);
        assert_eq!(summary.count(DeliveryOutcome::Sent), 1);
    }

    #[tokio::test]
    async fn test_unknown_sender_collected() {
        let mut broken = config("broken", &["*"]);
        broken.sender = "nowhere".to_string();
        let (captin, _) = captin(vec![broken]);

        captin.execute(event()).await.unwrap();

        let errors = captin.take_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].destination_name(), "broken");
        assert!(captin.errors().is_empty());
    }
}
