//! Error types shared by the dispatchers and graph stores.

use thiserror::Error;

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while dispatching an operation against the graph.
///
/// Store and transport failures are passed through as-is; the lambda runtime
/// decides whether the invocation is retried.
#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP error talking to the graph store: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gremlin server returned {status}: {message}")]
    Gremlin { status: u16, message: String },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid payload for {operation}: {source}")]
    Payload {
        operation: &'static str,
        source: serde_json::Error,
    },

    #[error("Missing argument {argument} for {operation}")]
    MissingArgument {
        operation: &'static str,
        argument: &'static str,
    },

    #[error("Traversal failed: {0}")]
    Traversal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn payload(operation: &'static str, source: serde_json::Error) -> Self {
        Error::Payload { operation, source }
    }

    pub(crate) fn missing(operation: &'static str, argument: &'static str) -> Self {
        Error::MissingArgument {
            operation,
            argument,
        }
    }
}
