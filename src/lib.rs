//! tailnet-redirect: HTTP redirect service for a private tailnet
//!
//! The service joins an overlay network (Tailscale) under a configured
//! hostname, listens on port 80 there and answers every GET request with a
//! `302 Found` to a fixed target URL, keeping the request path and query.
//! A dev mode skips the overlay network and listens on a plain local address.
//!
//! # Architecture
//!
//! - **Config**: CLI flags and layered TOML files, validated into an
//!   immutable [`config::Config`] with the dev/overlay choice resolved once
//! - **Redirect**: the request handler that computes the `Location`
//! - **Overlay**: starts the overlay node and hands out its listener
//! - **Server**: hyper HTTP/1.1 accept loop, one task per connection
//! - **Orchestrator**: startup sequencing; every failure is fatal

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod orchestrator;
pub mod overlay;
pub mod redirect;
pub mod server;
