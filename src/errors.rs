//! Error types for the agentry core.
//!
//! Protocol misuse (duplicate worker names, unmanaged ownership handles)
//! surfaces immediately as a typed error naming the offender. Failures inside
//! a worker's behavior hooks are carried as [`WorkerError`] and contained by
//! the scheduling loop.

use thiserror::Error;

/// Errors raised by the agency registry and the worker messaging surface.
#[derive(Debug, Error)]
pub enum AgencyError {
    /// A live worker with the same name is already registered.
    #[error("worker '{name}' already exists")]
    DuplicateWorker { name: String },

    /// A worker tried to address a pack to itself.
    #[error("worker '{name}' cannot send to itself")]
    SelfSend { name: String },

    /// The scheduling thread for a worker could not be created.
    #[error("failed to start thread for worker '{name}': {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the [`Owns`](crate::owns::Owns) shared-ownership registry.
#[derive(Debug, Error)]
pub enum OwnsError {
    /// `reserve` was called with a token that no allocation produced.
    #[error("cannot reserve unallocated handle #{id}")]
    ReserveUnallocated { id: u64 },

    /// `release` was called with a token that no allocation produced.
    #[error("cannot release unallocated handle #{id}")]
    ReleaseUnallocated { id: u64 },

    /// A value access was attempted through a token that is not managed.
    #[error("cannot access unallocated handle #{id}")]
    AccessUnallocated { id: u64 },

    /// The tracked value is not of the type the token claims.
    #[error("handle #{id} does not hold a value of the requested type")]
    TypeMismatch { id: u64 },
}

/// A failure raised inside a worker's `handle` or `tick` hook.
///
/// Carries a plain message; the scheduling loop wraps it with the worker's
/// name before reporting it through the worker's `ouch` hook.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct WorkerError {
    /// Human-readable failure description.
    pub message: String,
}

impl WorkerError {
    /// Create a new worker error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for WorkerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for WorkerError {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl From<AgencyError> for WorkerError {
    fn from(err: AgencyError) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}
