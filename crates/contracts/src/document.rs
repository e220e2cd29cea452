//! DocumentStore trait - target document source

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{Document, IncomingEvent};

/// Fetches a representation of the entity an event refers to
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, event: &IncomingEvent) -> Document;
}

/// Document stores keyed by `Destination::document_store_key`
pub type DocumentStoreMappings = HashMap<String, Arc<dyn DocumentStore>>;
