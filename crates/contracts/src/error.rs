//! Layered error definitions
//!
//! Categorized by source: config / store / throttle / document / transport

use thiserror::Error;

/// Unified collaborator error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Backend Errors =====
    /// Key-value store unreachable or rejected the operation
    #[error("store error: {message}")]
    Store { message: String },

    /// Throttle backend failure
    #[error("throttle error: {message}")]
    Throttle { message: String },

    /// Document store failure
    #[error("document store error: {message}")]
    DocumentStore { message: String },

    /// Event (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ===== Transport Errors =====
    /// Sender failed to deliver the event
    #[error("sender '{sender}' transport error: {message}")]
    Transport { sender: String, message: String },

    /// No sender registered under the requested key
    #[error("Sender key {key} does not exist")]
    UnknownSender { key: String },

    /// Validation failure that must never be retried
    #[error("unretryable: {message}")]
    Unretryable { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create throttle error
    pub fn throttle(message: impl Into<String>) -> Self {
        Self::Throttle {
            message: message.into(),
        }
    }

    /// Create document store error
    pub fn document_store(message: impl Into<String>) -> Self {
        Self::DocumentStore {
            message: message.into(),
        }
    }

    /// Create transport error
    pub fn transport(sender: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            sender: sender.into(),
            message: message.into(),
        }
    }

    /// Create unretryable error
    pub fn unretryable(message: impl Into<String>) -> Self {
        Self::Unretryable {
            message: message.into(),
        }
    }

    /// Whether an outer retry layer may try the operation again.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Unretryable { .. } | Self::ConfigValidation { .. } | Self::UnknownSender { .. }
        )
    }
}
