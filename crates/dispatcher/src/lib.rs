//! # Dispatcher
//!
//! Event fan-out engine.
//!
//! Responsible for:
//! - one concurrent task per destination per event
//! - throttling, with trailing sends of the latest payload
//! - shaping each destination's copy of the event
//! - isolating failures so one destination never blocks the others

pub mod backends;
pub mod captin;
pub mod customizer;
pub mod delayed;
pub mod dispatcher;
pub mod error;
pub mod filters;
pub mod locks;
pub mod metrics;
pub mod registry;
pub mod scheduler;
pub mod senders;
pub mod sift;

pub use backends::{MemoryStore, MemoryThrottle, NullDocumentStore, StaticDocumentStore};
pub use captin::Captin;
pub use customizer::{customize_event, select_fields, DocumentCache};
pub use dispatcher::{DestinationReport, DispatchSummary, Dispatcher, DispatcherBuilder};
pub use error::{DispatcherError, ErrorCollector, ExecutionError, FailureKind};
pub use filters::{ControlTimestampMiddleware, DesiredHookFilter, SourceFilter, ValidateFilter};
pub use locks::KeyedLocks;
pub use metrics::{DestinationMetrics, DispatcherMetrics, MetricsSnapshot};
pub use observability::DeliveryOutcome;
pub use registry::SenderRegistry;
pub use scheduler::DetachedScheduler;
pub use senders::{BeanstalkdSender, BeanstalkdSenderConfig, HttpSender, LogSender};
pub use sift::sift;
