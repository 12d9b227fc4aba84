//! Overlay network sessions.
//!
//! The overlay network (a tailnet) is an external collaborator: this module
//! only starts a node, waits until it has joined, and hands out a listener
//! for traffic arriving over the overlay. Transport and authentication stay
//! inside the overlay client.
//!
//! [`OverlayNetwork`] is the seam the startup sequence depends on;
//! [`TailscaleNode`] implements it on top of `tailscaled`.

pub mod error;
pub mod output;
pub mod status;
pub mod tailscale;

use std::future::Future;
use std::net::IpAddr;

use tokio::net::TcpListener;

pub use error::{OverlayError, OverlayResult};
pub use tailscale::{TailscaleNode, TailscaleSession, listen_address};

/// Identity of a node that has joined the overlay network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    /// Requested node name.
    pub hostname: String,
    /// Fully qualified name assigned by the control plane, if any.
    pub dns_name: Option<String>,
    /// Addresses assigned on the overlay network.
    pub addresses: Vec<IpAddr>,
}

/// Something that can join an overlay network.
pub trait OverlayNetwork {
    /// The session produced once the node is up.
    type Session: OverlaySession;

    /// Join the network, authenticating against the control plane.
    ///
    /// May block indefinitely on first run while waiting for an operator to
    /// approve the node.
    fn start(&self) -> impl Future<Output = OverlayResult<Self::Session>> + Send;
}

/// A node that has joined the overlay network.
pub trait OverlaySession: Send + Sized {
    /// Who this node is on the network.
    fn identity(&self) -> &NodeIdentity;

    /// Open a listener receiving overlay traffic for `port`.
    fn listen(&self, port: u16) -> impl Future<Output = OverlayResult<TcpListener>> + Send;

    /// Leave the network and stop the client.
    fn shutdown(self) -> impl Future<Output = ()> + Send;
}
