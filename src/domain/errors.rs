//! Domain errors for the node labeler.

use thiserror::Error;

/// An object could not be turned into a cache key.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("object has no name")]
    MissingName,
}

/// Failure to reconcile a single event. Every variant is retryable.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The key vanished from the cache between enqueue and processing
    #[error("object with key {key} not found in store")]
    NotFound { key: String },

    #[error("failed to fetch object with key {key} from store: {source}")]
    Lookup {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to label node {name}: {source}")]
    Patch {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ReconcileError {
    /// Key of the object the error refers to.
    pub fn key(&self) -> &str {
        match self {
            Self::NotFound { key } | Self::Lookup { key, .. } => key,
            Self::Patch { name, .. } => name,
        }
    }
}

/// Errors surfaced to the process-wide error reporter.
///
/// None of these stop the controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("caches failed to sync")]
    CacheSyncFailed,

    #[error("giving up on {key} after {attempts} attempts: {source}")]
    RetriesExhausted {
        key: String,
        attempts: u32,
        #[source]
        source: ReconcileError,
    },

    #[error("worker {worker} panicked: {message}")]
    WorkerPanicked { worker: usize, message: String },
}
