//! Configuration loading with hierarchy merging.
//!
//! Configuration is loaded from multiple sources and merged in order:
//!
//! 1. System config: `/etc/tailnet-redirect/config.toml`
//! 2. User config: `~/.config/tailnet-redirect/config.toml`
//! 3. Additional config file (via `--config` flag)
//! 4. CLI flags (highest priority)
//!
//! Later sources override earlier ones field by field. Missing system and
//! user files are skipped; a missing `--config` file is an error.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, FileConfig};
use crate::cli::Cli;

/// System-wide configuration path.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/tailnet-redirect/config.toml";

/// User configuration directory name.
pub const USER_CONFIG_DIR: &str = "tailnet-redirect";

/// User configuration filename.
pub const USER_CONFIG_FILE: &str = "config.toml";

/// Configuration loader with support for hierarchy merging.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Path to system-wide configuration.
    system_path: PathBuf,
    /// Path to user configuration.
    user_path: PathBuf,
}

impl ConfigLoader {
    /// Create a ConfigLoader with default paths.
    #[must_use]
    pub fn new() -> Self {
        let user_config_dir = dirs::config_dir()
            .map(|p| p.join(USER_CONFIG_DIR))
            .unwrap_or_else(|| PathBuf::from(".config").join(USER_CONFIG_DIR));

        Self {
            system_path: PathBuf::from(SYSTEM_CONFIG_PATH),
            user_path: user_config_dir.join(USER_CONFIG_FILE),
        }
    }

    /// Create a ConfigLoader with custom paths (for testing).
    #[must_use]
    pub fn with_paths(system_path: PathBuf, user_path: PathBuf) -> Self {
        Self {
            system_path,
            user_path,
        }
    }

    /// Load, merge and validate configuration from all sources.
    pub fn load(&self, cli: &Cli) -> ConfigResult<Config> {
        let merged = self.load_layers(cli)?;
        Config::from_file_config(merged)
    }

    /// Merge all configuration layers without validating the result.
    pub fn load_layers(&self, cli: &Cli) -> ConfigResult<FileConfig> {
        let mut config = FileConfig::default();

        if let Some(system_config) = self.load_file(&self.system_path)? {
            config.merge(system_config);
            debug!("Loaded system config from {:?}", self.system_path);
        } else {
            debug!("No system config found at {:?}", self.system_path);
        }

        if let Some(user_config) = self.load_file(&self.user_path)? {
            config.merge(user_config);
            debug!("Loaded user config from {:?}", self.user_path);
        } else {
            debug!("No user config found at {:?}", self.user_path);
        }

        if let Some(ref cli_config_path) = cli.config {
            match self.load_file(cli_config_path)? {
                Some(cli_config) => {
                    config.merge(cli_config);
                    debug!("Loaded additional config from {:?}", cli_config_path);
                }
                None => {
                    // Unlike system/user config, a missing CLI-specified config is an error
                    return Err(ConfigError::ReadError {
                        path: cli_config_path.clone(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "Specified config file not found",
                        ),
                    });
                }
            }
        }

        config.merge(cli.to_file_config());

        Ok(config)
    }

    /// Load a single config file, returning `None` if it doesn't exist.
    fn load_file(&self, path: &Path) -> ConfigResult<Option<FileConfig>> {
        match fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .map(Some)
                .map_err(|e| ConfigError::ParseError {
                    path: path.to_path_buf(),
                    source: e,
                }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListenMode;
    use clap::Parser;
    use tempfile::tempdir;

    fn loader_in(dir: &Path) -> ConfigLoader {
        ConfigLoader::with_paths(dir.join("system.toml"), dir.join("user.toml"))
    }

    #[test]
    fn test_cli_only() {
        let dir = tempdir().unwrap();
        let cli = Cli::parse_from([
            "tailnet-redirect",
            "--target",
            "https://example.com",
            "--hostname",
            "go",
        ]);

        let config = loader_in(dir.path()).load(&cli).unwrap();
        assert_eq!(config.target.as_str(), "https://example.com/");
        assert_eq!(config.hostname(), "go");
    }

    #[test]
    fn test_missing_target_everywhere() {
        let dir = tempdir().unwrap();
        let cli = Cli::parse_from(["tailnet-redirect", "--hostname", "go"]);

        let err = loader_in(dir.path()).load(&cli).unwrap_err();
        assert!(matches!(err, ConfigError::MissingTarget));
    }

    #[test]
    fn test_user_config_overrides_system() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("system.toml"),
            "target = \"https://system.example\"\nhostname = \"sys\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("user.toml"), "hostname = \"usr\"\n").unwrap();

        let cli = Cli::parse_from(["tailnet-redirect"]);
        let config = loader_in(dir.path()).load(&cli).unwrap();

        assert_eq!(config.target.host_str(), Some("system.example"));
        assert_eq!(config.hostname(), "usr");
    }

    #[test]
    fn test_cli_flags_override_files() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("user.toml"),
            "target = \"https://file.example\"\nhostname = \"file\"\ncontrol_url = \"https://hs.example\"\n",
        )
        .unwrap();

        let cli = Cli::parse_from(["tailnet-redirect", "--hostname", "flag"]);
        let config = loader_in(dir.path()).load(&cli).unwrap();

        assert_eq!(config.hostname(), "flag");
        match config.mode {
            ListenMode::Overlay(overlay) => {
                assert_eq!(overlay.control_url, "https://hs.example");
            }
            ListenMode::Dev(_) => panic!("Expected overlay mode"),
        }
    }

    #[test]
    fn test_additional_config_file() {
        let dir = tempdir().unwrap();
        let extra = dir.path().join("extra.toml");
        fs::write(
            &extra,
            "target = \"https://extra.example\"\ndev_listen = \":8080\"\n",
        )
        .unwrap();

        let cli = Cli::parse_from(["tailnet-redirect", "--config", extra.to_str().unwrap()]);
        let config = loader_in(dir.path()).load(&cli).unwrap();

        assert!(config.is_dev());
        assert_eq!(config.hostname(), "localhost:8080");
    }

    #[test]
    fn test_missing_additional_config_is_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let cli = Cli::parse_from(["tailnet-redirect", "--config", missing.to_str().unwrap()]);

        let err = loader_in(dir.path()).load(&cli).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("system.toml"), "target = [").unwrap();

        let cli = Cli::parse_from(["tailnet-redirect"]);
        let err = loader_in(dir.path()).load(&cli).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_verbose_flag_does_not_clear_file_setting() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("user.toml"), "verbose = true\n").unwrap();

        let cli = Cli::parse_from(["tailnet-redirect"]);
        let layers = loader_in(dir.path()).load_layers(&cli).unwrap();
        assert_eq!(layers.verbose, Some(true));
    }
}
