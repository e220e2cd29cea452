//! In-process collaborator backends
//!
//! Contains MemoryStore, MemoryThrottle, NullDocumentStore and StaticDocumentStore.

mod document;
mod memory_store;
mod memory_throttle;

pub use self::document::{NullDocumentStore, StaticDocumentStore};
pub use self::memory_store::MemoryStore;
pub use self::memory_throttle::MemoryThrottle;
