//! Destination configuration - Config Loader output
//!
//! Describes one delivery target and its policy knobs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sender key used when a configuration leaves `sender` empty
pub const DEFAULT_SENDER_KEY: &str = "http";

/// Document store key used when a configuration leaves `document_store` empty
pub const DEFAULT_DOCUMENT_STORE_KEY: &str = "default";

/// Action pattern that subscribes a destination to every event key
pub const WILDCARD_ACTION: &str = "*";

/// Per-destination delivery policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Unique destination name
    pub name: String,

    /// Event keys this destination subscribes to
    #[serde(default)]
    pub actions: Vec<String>,

    /// Callback target address
    #[serde(default)]
    pub callback_url: String,

    /// System tag of the destination itself (used by loopback filtering)
    #[serde(default)]
    pub source: String,

    /// Deliver events originating from `source` back to it
    #[serde(default)]
    pub allow_loopback: bool,

    /// Minimum time between two triggered sends for the same event key
    #[serde(default, with = "crate::duration")]
    pub throttle: Duration,

    /// Drop throttled events instead of sending the latest one after the window
    #[serde(default)]
    pub throttle_trailing_disabled: bool,

    /// Postpone every transport call by this long (fire-and-forget)
    #[serde(default, with = "crate::duration")]
    pub delay: Duration,

    /// Attach the target document to the event
    #[serde(default)]
    pub include_document: bool,

    /// Keep-list for document fields
    #[serde(default)]
    pub include_document_attrs: Vec<String>,

    /// Drop-list for document fields
    #[serde(default)]
    pub exclude_document_attrs: Vec<String>,

    /// Keep-list for payload fields
    #[serde(default)]
    pub include_payload_attrs: Vec<String>,

    /// Drop-list for payload fields
    #[serde(default)]
    pub exclude_payload_attrs: Vec<String>,

    /// Sender registry key (empty = `http`)
    #[serde(default)]
    pub sender: String,

    /// Document store key (empty = `default`)
    #[serde(default)]
    pub document_store: String,
}

impl Configuration {
    /// Create a configuration with every policy knob at its default
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Whether this destination subscribes to `event_key`
    pub fn handles(&self, event_key: &str) -> bool {
        self.actions
            .iter()
            .any(|action| action == WILDCARD_ACTION || action == event_key)
    }
}

/// One configured delivery target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub config: Configuration,
}

impl Destination {
    pub fn new(config: Configuration) -> Self {
        Self { config }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Callback URL, falling back to `<NAME>_CALLBACK_URL` from the environment
    pub fn callback_url(&self) -> String {
        if !self.config.callback_url.is_empty() {
            return self.config.callback_url.clone();
        }
        std::env::var(self.callback_env_var()).unwrap_or_default()
    }

    /// Registry key of the sender handling this destination
    pub fn sender_key(&self) -> &str {
        if self.config.sender.is_empty() {
            DEFAULT_SENDER_KEY
        } else {
            &self.config.sender
        }
    }

    /// Key into the document store mappings
    pub fn document_store_key(&self) -> &str {
        if self.config.document_store.is_empty() {
            DEFAULT_DOCUMENT_STORE_KEY
        } else {
            &self.config.document_store
        }
    }

    fn callback_env_var(&self) -> String {
        let name: String = self
            .config
            .name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{name}_CALLBACK_URL")
    }
}

impl From<Configuration> for Destination {
    fn from(config: Configuration) -> Self {
        Self::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_from_json() {
        let raw = r#"{
            "name": "service_one",
            "actions": ["product.update"],
            "callback_url": "http://localhost:3000/callback",
            "throttle": "500ms",
            "throttle_trailing_disabled": true,
            "delay": 1500,
            "include_document": true,
            "include_document_attrs": ["color"],
            "exclude_payload_attrs": ["field1"]
        }"#;
        let config: Configuration = serde_json::from_str(raw).unwrap();
        assert_eq!(config.throttle, Duration::from_millis(500));
        assert_eq!(config.delay, Duration::from_millis(1500));
        assert!(config.throttle_trailing_disabled);
        assert_eq!(config.include_document_attrs, vec!["color"]);
        assert!(config.sender.is_empty());
    }

    #[test]
    fn test_destination_defaults() {
        let destination = Destination::new(Configuration::new("service_one"));
        assert_eq!(destination.sender_key(), DEFAULT_SENDER_KEY);
        assert_eq!(destination.document_store_key(), DEFAULT_DOCUMENT_STORE_KEY);
    }

    #[test]
    fn test_callback_url_from_environment() {
        let destination = Destination::new(Configuration::new("env-hook"));
        std::env::set_var("ENV_HOOK_CALLBACK_URL", "http://hooks.internal/env");
        assert_eq!(destination.callback_url(), "http://hooks.internal/env");
        std::env::remove_var("ENV_HOOK_CALLBACK_URL");
    }

    #[test]
    fn test_handles_wildcard() {
        let mut config = Configuration::new("all");
        config.actions = vec![WILDCARD_ACTION.to_string()];
        assert!(config.handles("order.create"));

        config.actions = vec!["product.update".to_string()];
        assert!(config.handles("product.update"));
        assert!(!config.handles("product.delete"));
    }
}
