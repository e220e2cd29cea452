//! # Integration Tests
//!
//! End-to-end tests across crates.
//!
//! Covers:
//! - destination file -> mapper -> Captin -> senders
//! - throttling and trailing delivery over repeated events
//! - failure isolation between destinations

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{ContractError, Destination, Document, EventSender, IncomingEvent};
    use dispatcher::{Captin, DeliveryOutcome, StaticDocumentStore};
    use serde_json::json;

    const HOOKS: &str = r#"
[[configs]]
name = "search"
actions = ["product.update"]
callback_url = "http://search.local/hook"
sender = "mock"
include_document = true
include_document_attrs = ["color"]

[[configs]]
name = "warehouse"
actions = ["product.update"]
callback_url = "http://warehouse.local/hook"
sender = "mock"
throttle = "60s"
throttle_trailing_disabled = true
exclude_payload_attrs = ["field1"]

[[configs]]
name = "analytics"
actions = ["*"]
callback_url = "http://analytics.local/hook"
sender = "mock"
throttle = "10s"

[[configs]]
name = "billing"
actions = ["order.create"]
callback_url = "http://billing.local/hook"
sender = "mock"
"#;

    /// Records every delivery; fails for destinations named in `failing`
    #[derive(Default)]
    struct MockSender {
        calls: AtomicU64,
        deliveries: Mutex<Vec<(String, IncomingEvent)>>,
        failing: Vec<String>,
    }

    impl MockSender {
        fn failing(names: &[&str]) -> Self {
            Self {
                failing: names.iter().map(|n| n.to_string()).collect(),
                ..Self::default()
            }
        }

        fn deliveries_to(&self, name: &str) -> Vec<IncomingEvent> {
            self.deliveries
                .lock()
                .unwrap()
                .iter()
                .filter(|(n, _)| n == name)
                .map(|(_, e)| e.clone())
                .collect()
        }
    }

    #[async_trait]
    impl EventSender for MockSender {
        fn name(&self) -> &str {
            "mock"
        }

        async fn send_event(
            &self,
            event: &IncomingEvent,
            destination: &Destination,
        ) -> Result<(), ContractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.deliveries
                .lock()
                .unwrap()
                .push((destination.name().to_string(), event.clone()));
            if self.failing.iter().any(|n| n == destination.name()) {
                return Err(ContractError::transport("mock", "503 Service Unavailable"));
            }
            Ok(())
        }
    }

    fn captin_with(sender: Arc<MockSender>) -> Captin {
        let mapper = ConfigLoader::load_from_str(HOOKS, ConfigFormat::Toml).unwrap();

        let mut documents = StaticDocumentStore::new();
        documents.insert(
            "Product",
            "p1",
            json!({"color": "red", "size": "M"}).as_object().unwrap().clone(),
        );

        let mut captin = Captin::new(mapper)
            .unwrap()
            .with_document_store("default", Arc::new(documents));
        let mut senders: HashMap<String, Arc<dyn EventSender>> = HashMap::new();
        senders.insert("mock".to_string(), sender);
        captin.set_sender_mapping(senders);
        captin
    }

    fn product_update(ts: u64) -> IncomingEvent {
        let mut payload = Document::new();
        payload.insert("field1".to_string(), json!(1));
        payload.insert("field2".to_string(), json!(2));
        IncomingEvent::new("product.update", "core")
            .with_target("Product", "p1")
            .with_payload(payload)
            .with_control("ts", ts)
    }

    /// Full path: TOML file -> mapper -> filters -> shaping -> sender
    #[tokio::test]
    async fn test_e2e_config_to_delivery() {
        let sender = Arc::new(MockSender::default());
        let captin = captin_with(Arc::clone(&sender));

        let summary = captin.execute(product_update(1)).await.unwrap();

        assert_eq!(summary.len(), 3);
        assert_eq!(summary.count(DeliveryOutcome::Sent), 3);
        assert_eq!(summary.outcome("billing"), None);

        let search = sender.deliveries_to("search");
        assert_eq!(
            search[0].target_document,
            Some(json!({"color": "red"}).as_object().unwrap().clone())
        );
        let warehouse = sender.deliveries_to("warehouse");
        assert_eq!(
            serde_json::Value::Object(warehouse[0].payload.clone()),
            json!({"field2": 2})
        );
        assert!(warehouse[0].target_document.is_none());
        assert!(captin.errors().is_empty());
    }

    /// Repeated events: drop, trailing with last-writer-wins, immediate
    #[tokio::test(start_paused = true)]
    async fn test_e2e_repeated_events() {
        let sender = Arc::new(MockSender::default());
        let captin = captin_with(Arc::clone(&sender));

        captin.execute(product_update(100)).await.unwrap();
        let second = captin.execute(product_update(300)).await.unwrap();
        let stale = captin.execute(product_update(200)).await.unwrap();

        assert_eq!(second.outcome("warehouse"), Some(DeliveryOutcome::Suppressed));
        assert_eq!(second.outcome("analytics"), Some(DeliveryOutcome::Trailing));
        assert_eq!(stale.outcome("analytics"), Some(DeliveryOutcome::Suppressed));
        assert_eq!(sender.deliveries_to("search").len(), 3);
        assert_eq!(sender.deliveries_to("analytics").len(), 1);
        assert_eq!(captin.pending(), 1);

        captin.settle().await;

        let analytics = sender.deliveries_to("analytics");
        assert_eq!(analytics.len(), 2);
        assert_eq!(analytics[1].control_timestamp(), Some(300));
        assert_eq!(sender.deliveries_to("warehouse").len(), 1);
        assert_eq!(captin.metrics().destination("warehouse").snapshot().suppressed, 2);
    }

    /// One failing destination leaves the others untouched
    #[tokio::test]
    async fn test_e2e_failure_isolation() {
        let sender = Arc::new(MockSender::failing(&["search"]));
        let captin = captin_with(Arc::clone(&sender));

        let summary = captin.execute(product_update(1)).await.unwrap();

        assert_eq!(summary.outcome("search"), Some(DeliveryOutcome::Failed));
        assert_eq!(summary.count(DeliveryOutcome::Sent), 2);

        let errors = captin.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].destination_name(), "search");
        assert!(!errors[0].is_unretryable());
        assert!(errors[0].event.target_document.is_some());
    }

    /// Events echoing back to their source are filtered per destination
    #[tokio::test]
    async fn test_e2e_source_loopback() {
        let hooks = json!([
            {"name": "core_mirror", "actions": ["*"], "source": "core", "sender": "mock"},
            {"name": "core_audit", "actions": ["*"], "source": "core", "allow_loopback": true, "sender": "mock"}
        ])
        .to_string();
        let mapper = ConfigLoader::load_from_str(&hooks, ConfigFormat::Json).unwrap();
        let sender = Arc::new(MockSender::default());
        let mut captin = Captin::new(mapper).unwrap();
        let mut senders: HashMap<String, Arc<dyn EventSender>> = HashMap::new();
        senders.insert("mock".to_string(), Arc::clone(&sender) as Arc<dyn EventSender>);
        captin.set_sender_mapping(senders);

        captin.execute(product_update(1)).await.unwrap();

        assert!(sender.deliveries_to("core_mirror").is_empty());
        assert_eq!(sender.deliveries_to("core_audit").len(), 1);
    }
}
