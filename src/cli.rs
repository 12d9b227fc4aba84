//! Command-line interface definitions for tailnet-redirect.
//!
//! Uses clap's derive API for type-safe argument parsing. Every value flag
//! is optional at the clap level because it may also come from a config
//! file; required values are enforced when the merged configuration is
//! validated.

use clap::Parser;
use std::path::PathBuf;

use crate::config::FileConfig;

/// Redirect every request on a tailnet hostname to a target URL.
///
/// The service joins a Tailscale network as `--hostname`, listens on port
/// 80 and answers each GET request with a redirect to `--target`, keeping
/// the request path and query. With `--dev-listen` the overlay network is
/// skipped and a plain local address is used instead.
#[derive(Parser, Debug)]
#[command(name = "tailnet-redirect")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Be verbose: forward all overlay client output to the log.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// The URL base of the control plane (i.e. coordination server).
    ///
    /// Defaults to https://controlplane.tailscale.com.
    #[arg(long = "control-url", value_name = "URL")]
    pub control_url: Option<String>,

    /// The URL to redirect to.
    #[arg(long = "target", value_name = "URL")]
    pub target: Option<String>,

    /// If non-empty, listen on this address and don't use the overlay network.
    #[arg(long = "dev-listen", value_name = "ADDR")]
    pub dev_listen: Option<String>,

    /// Service name on the overlay network.
    #[arg(long = "hostname", value_name = "NAME")]
    pub hostname: Option<String>,

    /// Directory where the overlay client keeps its node state.
    ///
    /// Defaults to `.tsnet-state` in the working directory.
    #[arg(long = "state-dir", value_name = "PATH")]
    pub state_dir: Option<PathBuf>,

    /// TUN interface the overlay daemon creates (at most 15 bytes).
    ///
    /// Defaults to `tsredirect0`.
    #[arg(long = "tun", value_name = "NAME")]
    pub tun_name: Option<String>,

    /// Path to additional config file.
    ///
    /// Merged on top of system and user configs, giving it the highest
    /// priority (except for CLI flags).
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// The flags as a configuration layer.
    ///
    /// `--verbose` can only switch verbosity on; leaving it off keeps
    /// whatever a config file says.
    pub fn to_file_config(&self) -> FileConfig {
        FileConfig {
            target: self.target.clone(),
            hostname: self.hostname.clone(),
            control_url: self.control_url.clone(),
            dev_listen: self.dev_listen.clone(),
            state_dir: self.state_dir.clone(),
            tun_name: self.tun_name.clone(),
            verbose: self.verbose.then_some(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_basic() {
        let cli = Cli::parse_from([
            "tailnet-redirect",
            "--target",
            "https://example.com",
            "--hostname",
            "go",
        ]);
        assert_eq!(cli.target.as_deref(), Some("https://example.com"));
        assert_eq!(cli.hostname.as_deref(), Some("go"));
        assert!(!cli.verbose);
        assert!(cli.dev_listen.is_none());
        assert!(cli.control_url.is_none());
    }

    #[test]
    fn test_cli_parse_dev_mode() {
        let cli = Cli::parse_from([
            "tailnet-redirect",
            "--target=https://example.com",
            "--dev-listen=:8080",
            "-v",
        ]);
        assert_eq!(cli.dev_listen.as_deref(), Some(":8080"));
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_parse_all_options() {
        let cli = Cli::parse_from([
            "tailnet-redirect",
            "--control-url",
            "https://hs.example.com",
            "--target",
            "https://example.com",
            "--hostname",
            "go",
            "--state-dir",
            "/var/lib/redirect",
            "--tun",
            "tsgo0",
            "-c",
            "/etc/redirect.toml",
        ]);
        assert_eq!(cli.control_url.as_deref(), Some("https://hs.example.com"));
        assert_eq!(cli.state_dir, Some(PathBuf::from("/var/lib/redirect")));
        assert_eq!(cli.tun_name.as_deref(), Some("tsgo0"));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/redirect.toml")));
    }

    #[test]
    fn test_to_file_config() {
        let cli = Cli::parse_from(["tailnet-redirect", "--hostname", "go"]);
        let layer = cli.to_file_config();
        assert_eq!(layer.hostname.as_deref(), Some("go"));
        assert_eq!(layer.verbose, None);

        let cli = Cli::parse_from(["tailnet-redirect", "--verbose"]);
        assert_eq!(cli.to_file_config().verbose, Some(true));
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(Cli::try_parse_from(["tailnet-redirect", "--targets", "x"]).is_err());
    }
}
