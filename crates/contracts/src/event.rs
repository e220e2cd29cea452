//! IncomingEvent - ingress output, Dispatcher input

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered string-keyed JSON mapping used for payloads, documents and control metadata
pub type Document = Map<String, Value>;

/// Control key carrying the logical event time in nanoseconds
pub const CONTROL_TIMESTAMP: &str = "ts";

/// A single domain event to be fanned out to destinations.
///
/// Immutable as received: the dispatcher derives one customized copy per
/// destination and never mutates the original.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncomingEvent {
    /// Event type, e.g. `product.update`
    #[serde(rename = "event_key")]
    pub key: String,

    /// Origin system tag
    #[serde(default)]
    pub source: String,

    /// Business payload
    #[serde(default)]
    pub payload: Document,

    /// Type of the affected domain entity
    #[serde(default)]
    pub target_type: String,

    /// Identity of the affected domain entity
    #[serde(default)]
    pub target_id: String,

    /// Fetched representation of the target, attached per destination
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_document: Option<Document>,

    /// Transport and scheduling hints (`ts`, queue name, priority, ...)
    #[serde(default)]
    pub control: Document,
}

impl IncomingEvent {
    /// Create an event with an empty payload
    pub fn new(key: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            source: source.into(),
            ..Self::default()
        }
    }

    /// Set the affected entity
    pub fn with_target(mut self, target_type: impl Into<String>, target_id: impl Into<String>) -> Self {
        self.target_type = target_type.into();
        self.target_id = target_id.into();
        self
    }

    /// Replace the payload
    pub fn with_payload(mut self, payload: Document) -> Self {
        self.payload = payload;
        self
    }

    /// Insert one control entry
    pub fn with_control(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.control.insert(key.into(), value.into());
        self
    }

    /// An event is dispatchable once it names its type, origin and target.
    pub fn is_valid(&self) -> bool {
        !self.key.is_empty()
            && !self.source.is_empty()
            && !self.target_type.is_empty()
            && !self.target_id.is_empty()
    }

    /// Short identity used in log fields
    pub fn trace_info(&self) -> String {
        format!(
            "{}:{}:{}/{}",
            self.source, self.key, self.target_type, self.target_id
        )
    }

    /// Logical event time from `control.ts`.
    ///
    /// Accepts an unsigned integer or a numeric string. Returns `None` when
    /// the entry is missing or cannot be read as a `u64`.
    pub fn control_timestamp(&self) -> Option<u64> {
        match self.control.get(CONTROL_TIMESTAMP)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        }
    }
}
