//! Document stores: the null fallback and a static in-memory source

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use contracts::{Document, DocumentStore, IncomingEvent};

/// Fallback for unmapped document store keys; always empty
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDocumentStore;

#[async_trait]
impl DocumentStore for NullDocumentStore {
    async fn get_document(&self, _event: &IncomingEvent) -> Document {
        Document::new()
    }
}

/// Documents keyed by (target type, target id)
#[derive(Debug, Default)]
pub struct StaticDocumentStore {
    documents: HashMap<(String, String), Document>,
    fetches: AtomicU64,
}

impl StaticDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        target_type: impl Into<String>,
        target_id: impl Into<String>,
        document: Document,
    ) {
        self.documents
            .insert((target_type.into(), target_id.into()), document);
    }

    /// How many times a document was requested
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DocumentStore for StaticDocumentStore {
    async fn get_document(&self, event: &IncomingEvent) -> Document {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.documents
            .get(&(event.target_type.clone(), event.target_id.clone()))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_static_lookup() {
        let mut store = StaticDocumentStore::new();
        let mut document = Document::new();
        document.insert("color".to_string(), json!("red"));
        store.insert("Product", "p1", document.clone());

        let hit = IncomingEvent::new("product.update", "core").with_target("Product", "p1");
        let miss = IncomingEvent::new("product.update", "core").with_target("Product", "p2");

        assert_eq!(store.get_document(&hit).await, document);
        assert!(store.get_document(&miss).await.is_empty());
        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_null_store_is_empty() {
        let event = IncomingEvent::new("product.update", "core");
        assert!(NullDocumentStore.get_document(&event).await.is_empty());
    }
}
