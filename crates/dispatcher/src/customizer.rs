//! Event customization: document injection and field inclusion/exclusion

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{Destination, Document, DocumentStore, DocumentStoreMappings, IncomingEvent};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::debug;

/// Target documents for one dispatch, fetched at most once per document store.
///
/// Built before fan-out and shared read-only by every destination task.
pub struct DocumentCache {
    entries: HashMap<String, CachedDocument>,
}

struct CachedDocument {
    store: Arc<dyn DocumentStore>,
    document: OnceCell<Document>,
}

impl DocumentCache {
    /// Prepare one lazily-filled slot per document store the destinations use.
    ///
    /// Keys missing from `mappings` resolve to `fallback`.
    pub fn for_destinations(
        destinations: &[Destination],
        mappings: &DocumentStoreMappings,
        fallback: &Arc<dyn DocumentStore>,
    ) -> Self {
        let mut entries = HashMap::new();
        for destination in destinations.iter().filter(|d| d.config.include_document) {
            let key = destination.document_store_key();
            entries.entry(key.to_string()).or_insert_with(|| CachedDocument {
                store: mappings.get(key).cloned().unwrap_or_else(|| Arc::clone(fallback)),
                document: OnceCell::new(),
            });
        }
        Self { entries }
    }

    /// Document for `destination`, fetching it on first use
    pub async fn document(&self, destination: &Destination, event: &IncomingEvent) -> Option<&Document> {
        let entry = self.entries.get(destination.document_store_key())?;
        let document = entry
            .document
            .get_or_init(|| async {
                debug!(
                    document_store = %destination.document_store_key(),
                    event = %event.trace_info(),
                    "Fetching target document"
                );
                entry.store.get_document(event).await
            })
            .await;
        Some(document)
    }
}

/// Build the copy of `event` that `destination` receives.
///
/// The original event is left untouched.
pub async fn customize_event(
    event: &IncomingEvent,
    destination: &Destination,
    documents: &DocumentCache,
) -> IncomingEvent {
    let mut customized = event.clone();
    let config = &destination.config;

    if config.include_document {
        if let Some(document) = documents.document(destination, event).await {
            customized.target_document = Some(select_fields(
                document,
                &config.include_document_attrs,
                &config.exclude_document_attrs,
            ));
        }
    }

    customized.payload = select_fields(
        &event.payload,
        &config.include_payload_attrs,
        &config.exclude_payload_attrs,
    );

    customized
}

/// Apply a keep-list, else a drop-list, else return the mapping as is
pub fn select_fields(source: &Document, include: &[String], exclude: &[String]) -> Document {
    if !include.is_empty() {
        include_fields(source, include)
    } else if !exclude.is_empty() {
        exclude_fields(source, exclude)
    } else {
        source.clone()
    }
}

/// Keep only the listed fields; `a.b` selects `b` inside object `a`
pub fn include_fields(source: &Document, paths: &[String]) -> Document {
    retain(source, &FieldTree::from_paths(paths))
}

/// Drop the listed fields; `a.b` drops `b` inside object `a`
pub fn exclude_fields(source: &Document, paths: &[String]) -> Document {
    strip(source, &FieldTree::from_paths(paths))
}

#[derive(Debug, Default)]
struct FieldTree {
    whole: bool,
    children: HashMap<String, FieldTree>,
}

impl FieldTree {
    fn from_paths(paths: &[String]) -> Self {
        let mut root = FieldTree::default();
        for path in paths {
            let mut node = &mut root;
            for segment in path.split('.').filter(|s| !s.is_empty()) {
                node = node.children.entry(segment.to_string()).or_default();
            }
            node.whole = true;
        }
        root
    }
}

fn retain(source: &Document, tree: &FieldTree) -> Document {
    let mut out = Document::new();
    for (key, value) in source {
        let Some(node) = tree.children.get(key) else {
            continue;
        };
        if node.whole {
            out.insert(key.clone(), value.clone());
        } else if let Value::Object(inner) = value {
            out.insert(key.clone(), Value::Object(retain(inner, node)));
        }
    }
    out
}

fn strip(source: &Document, tree: &FieldTree) -> Document {
    let mut out = Document::new();
    for (key, value) in source {
        match (tree.children.get(key), value) {
            (None, _) => {
                out.insert(key.clone(), value.clone());
            }
            (Some(node), _) if node.whole => {}
            (Some(node), Value::Object(inner)) => {
                out.insert(key.clone(), Value::Object(strip(inner, node)));
            }
            (Some(_), _) => {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use contracts::Configuration;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    struct CountingStore {
        fetches: AtomicU64,
        document: Document,
    }

    #[async_trait]
    impl DocumentStore for CountingStore {
        async fn get_document(&self, _event: &IncomingEvent) -> Document {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.document.clone()
        }
    }

    fn counting_store() -> Arc<CountingStore> {
        Arc::new(CountingStore {
            fetches: AtomicU64::new(0),
            document: doc(json!({"color": "red", "size": "M"})),
        })
    }

    #[test]
    fn test_include_fields() {
        let document = doc(json!({"color": "red", "size": "M"}));
        assert_eq!(
            include_fields(&document, &strings(&["color"])),
            doc(json!({"color": "red"}))
        );
    }

    #[test]
    fn test_exclude_fields() {
        let payload = doc(json!({"field1": 1, "field2": 2}));
        assert_eq!(
            exclude_fields(&payload, &strings(&["field1"])),
            doc(json!({"field2": 2}))
        );
    }

    #[test]
    fn test_nested_paths() {
        let document = doc(json!({
            "id": "p1",
            "price": {"amount": 10, "currency": "TWD"},
            "tags": ["a"]
        }));

        assert_eq!(
            include_fields(&document, &strings(&["id", "price.currency"])),
            doc(json!({"id": "p1", "price": {"currency": "TWD"}}))
        );
        assert_eq!(
            exclude_fields(&document, &strings(&["price.amount", "tags"])),
            doc(json!({"id": "p1", "price": {"currency": "TWD"}}))
        );
        // a whole-field entry wins over a nested one
        assert_eq!(
            include_fields(&document, &strings(&["price.amount", "price"])),
            doc(json!({"price": {"amount": 10, "currency": "TWD"}}))
        );
    }

    #[test]
    fn test_include_takes_precedence() {
        let payload = doc(json!({"a": 1, "b": 2}));
        let selected = select_fields(&payload, &strings(&["a"]), &strings(&["a"]));
        assert_eq!(selected, doc(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_customize_event_leaves_original_untouched() {
        let store = counting_store();
        let mut mappings = DocumentStoreMappings::new();
        mappings.insert("default".to_string(), store.clone() as Arc<dyn DocumentStore>);
        let fallback: Arc<dyn DocumentStore> = store.clone();

        let mut config = Configuration::new("one");
        config.include_document = true;
        config.include_document_attrs = strings(&["color"]);
        config.exclude_payload_attrs = strings(&["field1"]);
        let destination = Destination::new(config);

        let event = IncomingEvent::new("product.update", "core")
            .with_target("Product", "p1")
            .with_payload(doc(json!({"field1": 1, "field2": 2})));

        let cache = DocumentCache::for_destinations(
            std::slice::from_ref(&destination),
            &mappings,
            &fallback,
        );
        let customized = customize_event(&event, &destination, &cache).await;

        assert_eq!(customized.target_document, Some(doc(json!({"color": "red"}))));
        assert_eq!(customized.payload, doc(json!({"field2": 2})));
        assert_eq!(event.payload, doc(json!({"field1": 1, "field2": 2})));
        assert!(event.target_document.is_none());
    }

    #[tokio::test]
    async fn test_document_fetched_once_per_store() {
        let store = counting_store();
        let mut mappings = DocumentStoreMappings::new();
        mappings.insert("default".to_string(), store.clone() as Arc<dyn DocumentStore>);
        let fallback: Arc<dyn DocumentStore> = store.clone();

        let destinations: Vec<_> = ["one", "two", "three"]
            .iter()
            .map(|name| {
                let mut config = Configuration::new(*name);
                config.include_document = true;
                Destination::new(config)
            })
            .collect();

        let event = IncomingEvent::new("product.update", "core").with_target("Product", "p1");
        let cache = Arc::new(DocumentCache::for_destinations(&destinations, &mappings, &fallback));

        let mut tasks = tokio::task::JoinSet::new();
        for destination in destinations {
            let cache = Arc::clone(&cache);
            let event = event.clone();
            tasks.spawn(async move { customize_event(&event, &destination, &cache).await });
        }
        while let Some(result) = tasks.join_next().await {
            assert!(result.unwrap().target_document.is_some());
        }

        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_document_requested() {
        let store = counting_store();
        let fallback: Arc<dyn DocumentStore> = store.clone();
        let destination = Destination::new(Configuration::new("plain"));
        let cache = DocumentCache::for_destinations(
            std::slice::from_ref(&destination),
            &DocumentStoreMappings::new(),
            &fallback,
        );

        let event = IncomingEvent::new("product.update", "core");
        let customized = customize_event(&event, &destination, &cache).await;
        assert!(customized.target_document.is_none());
        assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
    }
}
