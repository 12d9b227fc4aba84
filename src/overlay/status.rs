//! Parsing of `tailscale status --json`.
//!
//! Only the handful of fields the service needs are deserialized; the rest
//! of the document is ignored.

use serde::Deserialize;
use std::net::IpAddr;

use super::NodeIdentity;
use super::error::{OverlayError, OverlayResult};

/// Backend state reported once the node is connected.
pub const BACKEND_RUNNING: &str = "Running";

/// Top-level status document.
#[derive(Debug, Deserialize)]
pub struct StatusReport {
    /// Connection state, e.g. `NeedsLogin`, `Starting`, `Running`.
    #[serde(rename = "BackendState")]
    pub backend_state: String,

    /// This node.
    #[serde(rename = "Self")]
    pub self_node: Option<SelfStatus>,

    /// Login URL while the node is waiting for approval.
    #[serde(rename = "AuthURL", default)]
    pub auth_url: String,
}

/// Status of the local node.
#[derive(Debug, Deserialize)]
pub struct SelfStatus {
    /// Fully qualified tailnet name, with a trailing dot.
    #[serde(rename = "DNSName", default)]
    pub dns_name: String,

    /// Addresses assigned on the tailnet.
    #[serde(rename = "TailscaleIPs", default)]
    pub tailscale_ips: Vec<IpAddr>,
}

impl StatusReport {
    /// Parse a status document.
    pub fn parse(json: &str) -> OverlayResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The node's identity, if it is connected.
    pub fn into_identity(self, hostname: &str) -> OverlayResult<NodeIdentity> {
        if self.backend_state != BACKEND_RUNNING {
            return Err(OverlayError::NotRunning(self.backend_state));
        }

        let self_node = self
            .self_node
            .ok_or_else(|| OverlayError::Status("status has no Self entry".to_string()))?;

        let dns_name = self_node.dns_name.trim_end_matches('.');
        Ok(NodeIdentity {
            hostname: hostname.to_string(),
            dns_name: (!dns_name.is_empty()).then(|| dns_name.to_string()),
            addresses: self_node.tailscale_ips,
        })
    }
}
