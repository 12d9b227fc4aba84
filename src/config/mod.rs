//! Configuration system for tailnet-redirect.
//!
//! Configuration comes from TOML files and command-line flags and is merged
//! into one layer, then validated into an immutable [`Config`]. Validation
//! resolves the listen mode exactly once:
//!
//! - [`ListenMode::Dev`] when a dev listen address is set. The overlay
//!   network is never started; a hostname is derived from the address if
//!   none was given.
//! - [`ListenMode::Overlay`] otherwise. A hostname is required.
//!
//! # Configuration Hierarchy
//!
//! 1. System config: `/etc/tailnet-redirect/config.toml`
//! 2. User config: `~/.config/tailnet-redirect/config.toml`
//! 3. Additional config file (via `--config` flag)
//! 4. CLI flags (highest priority)
//!
//! ```toml
//! target = "https://example.com/docs"
//! hostname = "docs"
//! control_url = "https://controlplane.tailscale.com"
//! state_dir = "/var/lib/tailnet-redirect"
//! tun_name = "tsredirect0"
//! ```

mod error;
pub mod listen;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use schema::{
    Config, DEFAULT_CONTROL_URL, DEFAULT_STATE_DIR, DEFAULT_TUN_NAME, DevConfig, FileConfig,
    ListenMode, MAX_TUN_NAME_LEN, OVERLAY_HTTP_PORT, OverlayConfig,
};
