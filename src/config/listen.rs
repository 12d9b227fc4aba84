//! Host/port handling for the dev-mode listen address.
//!
//! Dev addresses use the `host:port` notation familiar from other network
//! tools, where the host may be omitted (`:8080`) to mean every interface
//! and IPv6 literals are bracketed (`[::1]:8080`). Rust's socket address
//! parser accepts neither an empty host nor an unbracketed IPv6 literal, so
//! the address is split here and rebuilt before binding.

use super::error::{ConfigError, ConfigResult};

/// Host substituted for an empty host part when deriving a dev hostname.
pub const DEV_DEFAULT_HOST: &str = "localhost";

/// Hosts bound, in order of preference, when the dev address omits one.
///
/// The IPv6 wildcard also accepts IPv4 on dual-stack hosts; the IPv4
/// wildcard covers hosts without IPv6.
pub const DEV_WILDCARD_HOSTS: [&str; 2] = ["::", "0.0.0.0"];

/// Split `host:port` into its parts.
///
/// The host may be empty. A bracketed host must be followed directly by the
/// port separator. An empty port is allowed and left for the binder to
/// interpret.
pub fn split_host_port(addr: &str) -> ConfigResult<(&str, &str)> {
    let invalid = |message: &str| ConfigError::InvalidListenAddress {
        addr: addr.to_string(),
        message: message.to_string(),
    };

    let colon = addr.rfind(':').ok_or_else(|| invalid("missing port in address"))?;
    let port = &addr[colon + 1..];

    let host = if let Some(rest) = addr.strip_prefix('[') {
        let close = rest.find(']').ok_or_else(|| invalid("missing ']' in address"))?;
        // `close` is relative to `rest`, which starts one byte into `addr`.
        match close + 2 {
            end if end == colon => &rest[..close],
            end if end == addr.len() => return Err(invalid("missing port in address")),
            _ => return Err(invalid("unexpected characters after ']'")),
        }
    } else {
        let host = &addr[..colon];
        if host.contains(':') {
            return Err(invalid("too many colons in address"));
        }
        host
    };

    if host.contains(['[', ']']) || port.contains(['[', ']']) {
        return Err(invalid("unexpected bracket in address"));
    }

    Ok((host, port))
}

/// Combine a host and port, bracketing IPv6 literals.
pub fn join_host_port(host: &str, port: &str) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Hostname reported for a dev listener when none was configured.
///
/// `:8080` becomes `localhost:8080`; an explicit host is kept as given.
pub fn derive_dev_hostname(listen_addr: &str) -> ConfigResult<String> {
    let (host, port) = split_host_port(listen_addr)?;
    let host = if host.is_empty() { DEV_DEFAULT_HOST } else { host };
    Ok(join_host_port(host, port))
}

/// Candidate addresses for `tokio::net::TcpListener::bind`, best first.
///
/// An empty host yields the wildcard addresses and an empty port asks the
/// OS for an ephemeral one.
pub fn dev_bind_addresses(listen_addr: &str) -> ConfigResult<Vec<String>> {
    let (host, port) = split_host_port(listen_addr)?;
    let port = if port.is_empty() { "0" } else { port };

    if host.is_empty() {
        Ok(DEV_WILDCARD_HOSTS
            .iter()
            .map(|host| join_host_port(host, port))
            .collect())
    } else {
        Ok(vec![join_host_port(host, port)])
    }
}
