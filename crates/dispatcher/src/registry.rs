//! SenderRegistry - maps sender keys to transports

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{ContractError, EventSender, DEFAULT_SENDER_KEY};

use crate::senders::HttpSender;

/// Transports keyed by `Configuration::sender`
#[derive(Clone, Default)]
pub struct SenderRegistry {
    senders: HashMap<String, Arc<dyn EventSender>>,
}

impl SenderRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in http transport under the default key
    pub fn with_default_http() -> Result<Self, ContractError> {
        let mut registry = Self::new();
        registry.register(DEFAULT_SENDER_KEY, Arc::new(HttpSender::new()?));
        Ok(registry)
    }

    /// Add or replace a transport
    pub fn register(&mut self, key: impl Into<String>, sender: Arc<dyn EventSender>) {
        self.senders.insert(key.into(), sender);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.senders.contains_key(key)
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.senders.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Transport for `key`
    ///
    /// # Errors
    /// `ContractError::UnknownSender` when nothing is registered under `key`
    pub fn resolve(&self, key: &str) -> Result<Arc<dyn EventSender>, ContractError> {
        self.senders
            .get(key)
            .cloned()
            .ok_or_else(|| ContractError::UnknownSender {
                key: key.to_string(),
            })
    }
}

impl std::fmt::Debug for SenderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::senders::LogSender;

    #[test]
    fn test_default_http_registered() {
        let registry = SenderRegistry::with_default_http().unwrap();
        assert!(registry.contains("http"));
        assert!(registry.resolve("http").is_ok());
    }

    #[test]
    fn test_unknown_key() {
        let mut registry = SenderRegistry::new();
        registry.register("log", Arc::new(LogSender::new("log")));

        assert_eq!(registry.keys(), vec!["log"]);
        let err = registry.resolve("beanstalkd").err().unwrap();
        assert!(matches!(err, ContractError::UnknownSender { .. }));
    }
}
