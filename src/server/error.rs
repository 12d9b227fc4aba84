//! Error types for the HTTP server.

use thiserror::Error;

/// Errors that stop the server. All of them are fatal to the process.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Could not bind the listen address.
    #[error("Failed to listen on {addr}: {source}")]
    Bind {
        /// The address we tried to bind.
        addr: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The listener failed with a non-transient error.
    #[error("Failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),

    /// I/O error (socket operations).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
