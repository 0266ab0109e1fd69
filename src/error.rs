//! Error types for chunked streaming and push delivery.
//!
//! All fallible operations in this crate return [`ChunkcastError`]. The
//! taxonomy separates the expected shutdown signal from real failures:
//!
//! - **Termination**: the transport context was terminated. Loops treat this
//!   as a normal exit, never as a failure.
//! - **Transport Errors**: unexpected I/O failures from the socket layer.
//!   These are fatal and are never retried inside the crate.
//! - **Protocol Errors**: frames with the wrong shape, such as a push message
//!   that does not have exactly three parts.
//! - **Decode Errors**: a chunk payload that is not a valid encoded batch.
//! - **Handler Errors**: a listener callback that failed.
//!
//! ```rust
//! use chunkcast::ChunkcastError;
//!
//! let error = ChunkcastError::Terminated;
//! assert!(error.is_termination());
//!
//! let error = ChunkcastError::transport_failed("recv");
//! assert!(!error.is_termination());
//! ```

use thiserror::Error;

/// Boxed error used for foreign sources and callback failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias for chunkcast operations.
pub type Result<T, E = ChunkcastError> = std::result::Result<T, E>;

/// Main error type for chunkcast operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ChunkcastError {
    #[error("Transport context terminated")]
    Terminated,

    #[error("Transport operation '{operation}' failed")]
    Transport {
        operation: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Endpoint '{endpoint}' is closed or unreachable")]
    Closed { endpoint: String },

    #[error("Protocol violation in {context}: {details}")]
    Protocol { context: String, details: String },

    #[error("Failed to decode chunk payload")]
    Decode {
        #[from]
        source: serde_json::Error,
    },

    #[error("Message handler failed")]
    Handler {
        #[source]
        source: BoxError,
    },

    #[error("Invalid configuration: {details}")]
    Config { details: String },
}

impl ChunkcastError {
    /// Returns whether this error is the transport termination signal.
    pub fn is_termination(&self) -> bool {
        matches!(self, ChunkcastError::Terminated)
    }

    /// Returns whether a caller could reasonably retry the failed operation.
    ///
    /// Nothing in this crate retries on its own; this is guidance for callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            ChunkcastError::Transport { .. } => true,
            ChunkcastError::Closed { .. } => true,
            ChunkcastError::Terminated => false,
            ChunkcastError::Protocol { .. } => false,
            ChunkcastError::Decode { .. } => false,
            ChunkcastError::Handler { .. } => false,
            ChunkcastError::Config { .. } => false,
        }
    }

    /// Helper constructor for transport errors.
    pub fn transport_failed(operation: impl Into<String>) -> Self {
        ChunkcastError::Transport { operation: operation.into(), source: None }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport_failed_with_source(operation: impl Into<String>, source: BoxError) -> Self {
        ChunkcastError::Transport { operation: operation.into(), source: Some(source) }
    }

    /// Helper constructor for closed endpoints.
    pub fn closed(endpoint: impl Into<String>) -> Self {
        ChunkcastError::Closed { endpoint: endpoint.into() }
    }

    /// Helper constructor for protocol violations.
    pub fn protocol(context: impl Into<String>, details: impl Into<String>) -> Self {
        ChunkcastError::Protocol { context: context.into(), details: details.into() }
    }

    /// Helper constructor for handler failures.
    pub fn handler(source: BoxError) -> Self {
        ChunkcastError::Handler { source }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        ChunkcastError::Config { details: details.into() }
    }
}

impl From<serde_yaml_ng::Error> for ChunkcastError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        ChunkcastError::Config { details: err.to_string() }
    }
}

#[cfg(feature = "zmq")]
impl From<zmq::Error> for ChunkcastError {
    fn from(err: zmq::Error) -> Self {
        match err {
            zmq::Error::ETERM => ChunkcastError::Terminated,
            other => ChunkcastError::Transport {
                operation: "zmq".to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}
