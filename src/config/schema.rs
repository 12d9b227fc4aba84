//! Configuration schema definitions.
//!
//! Two layers live here:
//!
//! - [`FileConfig`]: the raw, all-optional shape of a TOML file or of the
//!   CLI flags. Layers are merged with [`FileConfig::merge`].
//! - [`Config`]: the validated, immutable configuration the service runs
//!   with. The dev/overlay choice is resolved once into [`ListenMode`].

use serde::Deserialize;
use std::path::PathBuf;
use url::Url;

use super::error::{ConfigError, ConfigResult};
use super::listen::derive_dev_hostname;

/// Default coordination server for the overlay network.
pub const DEFAULT_CONTROL_URL: &str = "https://controlplane.tailscale.com";

/// Default directory for the overlay client's node identity and credentials.
pub const DEFAULT_STATE_DIR: &str = ".tsnet-state";

/// Default name of the overlay daemon's TUN interface.
pub const DEFAULT_TUN_NAME: &str = "tsredirect0";

/// Longest interface name the kernel accepts (`IFNAMSIZ` minus the NUL).
pub const MAX_TUN_NAME_LEN: usize = 15;

/// Port the service listens on inside the overlay network.
pub const OVERLAY_HTTP_PORT: u16 = 80;

/// One configuration layer, as read from a file or the command line.
///
/// Every field is optional so that a later layer only overrides what it
/// actually sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// URL to redirect to.
    pub target: Option<String>,
    /// Node name on the overlay network.
    pub hostname: Option<String>,
    /// Base URL of the overlay control plane.
    pub control_url: Option<String>,
    /// If set, listen on this address and skip the overlay network.
    pub dev_listen: Option<String>,
    /// Directory for the overlay client's persistent state.
    pub state_dir: Option<PathBuf>,
    /// TUN interface the overlay daemon creates.
    pub tun_name: Option<String>,
    /// Forward all overlay client output to the log.
    pub verbose: Option<bool>,
}

impl FileConfig {
    /// Merge another layer into this one. Values set in `other` win.
    pub fn merge(&mut self, other: FileConfig) {
        if other.target.is_some() {
            self.target = other.target;
        }
        if other.hostname.is_some() {
            self.hostname = other.hostname;
        }
        if other.control_url.is_some() {
            self.control_url = other.control_url;
        }
        if other.dev_listen.is_some() {
            self.dev_listen = other.dev_listen;
        }
        if other.state_dir.is_some() {
            self.state_dir = other.state_dir;
        }
        if other.tun_name.is_some() {
            self.tun_name = other.tun_name;
        }
        if other.verbose.is_some() {
            self.verbose = other.verbose;
        }
    }
}

/// Validated service configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Where requests are redirected to.
    pub target: Url,
    /// How the listener is obtained.
    pub mode: ListenMode,
    /// Forward all overlay client output to the log.
    pub verbose: bool,
}

/// How the service obtains its listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenMode {
    /// Plain local listener; the overlay network is never touched.
    Dev(DevConfig),
    /// Listener on port 80 of an overlay network node.
    Overlay(OverlayConfig),
}

/// Settings for dev mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevConfig {
    /// Address to listen on, e.g. `:8080`.
    pub listen_addr: String,
    /// Name the service is reachable under (informational).
    pub hostname: String,
}

/// Settings for joining the overlay network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayConfig {
    /// Node name to register with the control plane.
    pub hostname: String,
    /// Base URL of the control plane.
    pub control_url: String,
    /// Directory for the overlay client's persistent state.
    pub state_dir: PathBuf,
    /// TUN interface carrying the node's overlay addresses.
    pub tun_name: String,
}

impl Config {
    /// Validate a merged configuration layer.
    ///
    /// The target is checked first, then the listen mode is resolved. A dev
    /// listen address makes the hostname optional; otherwise it is required.
    pub fn from_file_config(raw: FileConfig) -> ConfigResult<Self> {
        let target = parse_target(raw.target.as_deref().unwrap_or_default())?;
        let hostname = raw.hostname.filter(|h| !h.is_empty());

        let mode = match raw.dev_listen.filter(|d| !d.is_empty()) {
            Some(listen_addr) => {
                let hostname = match hostname {
                    Some(hostname) => hostname,
                    None => derive_dev_hostname(&listen_addr)?,
                };
                ListenMode::Dev(DevConfig {
                    listen_addr,
                    hostname,
                })
            }
            None => ListenMode::Overlay(OverlayConfig {
                hostname: hostname.ok_or(ConfigError::MissingHostname)?,
                control_url: raw
                    .control_url
                    .filter(|u| !u.is_empty())
                    .unwrap_or_else(|| DEFAULT_CONTROL_URL.to_string()),
                state_dir: raw
                    .state_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR)),
                tun_name: parse_tun_name(raw.tun_name)?,
            }),
        };

        Ok(Self {
            target,
            mode,
            verbose: raw.verbose.unwrap_or(false),
        })
    }

    /// Name the service is reachable under.
    pub fn hostname(&self) -> &str {
        match &self.mode {
            ListenMode::Dev(dev) => &dev.hostname,
            ListenMode::Overlay(overlay) => &overlay.hostname,
        }
    }

    /// Whether the overlay network is bypassed.
    pub fn is_dev(&self) -> bool {
        matches!(self.mode, ListenMode::Dev(_))
    }
}

/// Parse the redirect target.
///
/// The target must be an absolute URL with a host, since the redirect
/// replaces the request's scheme and host with the target's.
fn parse_target(value: &str) -> ConfigResult<Url> {
    if value.is_empty() {
        return Err(ConfigError::MissingTarget);
    }

    let invalid = |message: String| ConfigError::InvalidTarget {
        value: value.to_string(),
        message,
    };

    let url = Url::parse(value).map_err(|e| invalid(e.to_string()))?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(invalid("URL has no host".to_string())),
    }
}

/// Validate the TUN interface name, defaulting when unset or empty.
fn parse_tun_name(value: Option<String>) -> ConfigResult<String> {
    let name = match value.filter(|n| !n.is_empty()) {
        Some(name) => name,
        None => return Ok(DEFAULT_TUN_NAME.to_string()),
    };

    let invalid = |message: &str| ConfigError::InvalidTunName {
        name: name.clone(),
        message: message.to_string(),
    };

    if name.len() > MAX_TUN_NAME_LEN {
        return Err(invalid("longer than 15 bytes"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(invalid("only ASCII letters, digits, '-', '_' and '.' are allowed"));
    }
    Ok(name)
}
