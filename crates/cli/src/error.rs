//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Event input could not be read or parsed
    #[error("Failed to read events from {source_name}: {message}")]
    EventInput {
        source_name: String,
        message: String,
    },

    /// Some destinations failed
    #[error("{count} destination(s) failed")]
    DeliveryFailures { count: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn event_input(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EventInput {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}
