//! Dispatcher error types

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{ContractError, Destination, IncomingEvent};
use thiserror::Error;
use tracing::error;

/// Why a destination failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Sender returned an error
    Transport,
    /// Sender rejected the event as invalid; never retry
    Unretryable,
    /// No sender registered under the destination's key
    UnknownSender,
    /// Store read/write or payload (de)serialization failed on the delayed path
    Bookkeeping,
    /// Destination task aborted unexpectedly
    Internal,
}

/// One destination's send failure.
///
/// Carries the destination and the (customized) event it was handling.
#[derive(Debug, Clone, Error)]
#[error("event to '{}' failed: {}", .destination.config.name, .message)]
pub struct DispatcherError {
    pub message: String,
    pub kind: FailureKind,
    pub destination: Destination,
    pub event: IncomingEvent,
}

impl DispatcherError {
    pub fn new(
        kind: FailureKind,
        message: impl Into<String>,
        destination: &Destination,
        event: &IncomingEvent,
    ) -> Self {
        Self {
            message: message.into(),
            kind,
            destination: destination.clone(),
            event: event.clone(),
        }
    }

    /// Classify a collaborator error
    pub fn from_contract(
        err: &ContractError,
        destination: &Destination,
        event: &IncomingEvent,
    ) -> Self {
        let kind = match err {
            ContractError::Unretryable { .. } => FailureKind::Unretryable,
            ContractError::UnknownSender { .. } => FailureKind::UnknownSender,
            ContractError::Store { .. }
            | ContractError::Throttle { .. }
            | ContractError::DocumentStore { .. }
            | ContractError::Serialization(_) => FailureKind::Bookkeeping,
            _ => FailureKind::Transport,
        };
        Self::new(kind, err.to_string(), destination, event)
    }

    pub fn is_unretryable(&self) -> bool {
        self.kind == FailureKind::Unretryable
    }

    pub fn destination_name(&self) -> &str {
        self.destination.name()
    }
}

/// Top-level rejection before any destination is touched
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("invalid incoming event: {reason}")]
    InvalidEvent { reason: String },
}

impl ExecutionError {
    pub fn invalid_event(reason: impl Into<String>) -> Self {
        Self::InvalidEvent {
            reason: reason.into(),
        }
    }
}

/// Failures appended by concurrent destination tasks and detached timers
#[derive(Debug, Clone, Default)]
pub struct ErrorCollector {
    inner: Arc<Mutex<Vec<DispatcherError>>>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, err: DispatcherError) {
        error!(
            destination = %err.destination_name(),
            event = %err.event.trace_info(),
            kind = ?err.kind,
            error = %err.message,
            "Destination failed"
        );
        self.lock().push(err);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of every failure recorded so far
    pub fn snapshot(&self) -> Vec<DispatcherError> {
        self.lock().clone()
    }

    /// Drain recorded failures
    pub fn take(&self) -> Vec<DispatcherError> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DispatcherError>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
