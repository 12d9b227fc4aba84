//! Error types for overlay network sessions.

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors from establishing or using an overlay network session.
///
/// All of them are fatal at startup; there is no retry.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// Failed to create the state directory.
    #[error("Failed to prepare state directory {path}: {source}")]
    StateDir {
        /// The state directory.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to start an overlay client program.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        /// The program that couldn't be started.
        program: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to wait for an overlay client program.
    #[error("Failed to wait for {program}: {source}")]
    Wait {
        /// The program being waited on.
        program: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The overlay daemon exited before the session was established.
    #[error("Overlay daemon exited early ({0})")]
    DaemonExited(ExitStatus),

    /// The daemon's control socket never appeared.
    #[error("Overlay daemon socket {0} did not appear")]
    SocketTimeout(PathBuf),

    /// Bringing the node up (login/registration) failed.
    #[error("Failed to bring overlay node up ({0})")]
    UpFailed(ExitStatus),

    /// A status query failed.
    #[error("Overlay status query failed: {0}")]
    Status(String),

    /// The node is not connected after `up` returned.
    #[error("Overlay node is not running (backend state: {0})")]
    NotRunning(String),

    /// The node reported no overlay addresses to listen on.
    #[error("Overlay node {0} has no addresses")]
    NoAddress(String),

    /// Failed to open the listener for the overlay port.
    #[error("Failed to listen on overlay port {port}: {source}")]
    Listen {
        /// The requested port.
        port: u16,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to signal the overlay daemon.
    #[error("Failed to signal overlay daemon: {0}")]
    Signal(#[source] nix::Error),
}

/// Result type for overlay operations.
pub type OverlayResult<T> = Result<T, OverlayError>;

impl From<serde_json::Error> for OverlayError {
    fn from(err: serde_json::Error) -> Self {
        OverlayError::Status(err.to_string())
    }
}
