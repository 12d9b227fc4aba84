//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
///
/// Every variant is fatal at startup: the service refuses to start rather
/// than run with a partially valid configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the file that couldn't be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse a TOML configuration file.
    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the file that couldn't be parsed.
        path: PathBuf,
        /// The underlying TOML parse error.
        source: toml::de::Error,
    },

    /// No redirect target was configured.
    #[error("--target cannot be empty")]
    MissingTarget,

    /// The redirect target is not a usable absolute URL.
    #[error("Unable to parse target url '{value}': {message}")]
    InvalidTarget {
        /// The raw target string.
        value: String,
        /// Why it was rejected.
        message: String,
    },

    /// No hostname was configured for the overlay node.
    #[error("--hostname cannot be empty")]
    MissingHostname,

    /// The dev-mode listen address could not be split into host and port.
    #[error("Invalid listen address '{addr}': {message}")]
    InvalidListenAddress {
        /// The raw address string.
        addr: String,
        /// Why it was rejected.
        message: String,
    },

    /// The overlay TUN interface name is unusable.
    #[error("Invalid TUN interface name '{name}': {message}")]
    InvalidTunName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        message: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_values_name_the_flag() {
        assert_eq!(ConfigError::MissingTarget.to_string(), "--target cannot be empty");
        assert_eq!(
            ConfigError::MissingHostname.to_string(),
            "--hostname cannot be empty"
        );
    }

    #[test]
    fn test_invalid_listen_address_display() {
        let err = ConfigError::InvalidListenAddress {
            addr: "8080".to_string(),
            message: "missing port in address".to_string(),
        };
        assert!(err.to_string().contains("'8080'"));
        assert!(err.to_string().contains("missing port"));
    }
}
