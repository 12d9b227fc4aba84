//! HTTP/1.1 server for the redirect handler.
//!
//! The server owns an already-bound TCP listener (plain local socket or the
//! overlay listener) and serves every accepted connection in its own Tokio
//! task with hyper's HTTP/1.1 implementation. The handler is shared
//! read-only between tasks.
//!
//! # Example
//!
//! ```ignore
//! use tailnet_redirect::redirect::RedirectHandler;
//! use tailnet_redirect::server::{bind, RedirectServer};
//!
//! let listener = bind("127.0.0.1:8080").await?;
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let server = RedirectServer::new(listener, RedirectHandler::new(target), shutdown_rx);
//! server.run().await?;
//!
//! // To shutdown:
//! shutdown_tx.send(true)?;
//! ```

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::Request;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::error::{ServerError, ServerResult};
use crate::redirect::RedirectHandler;

/// First delay after a transient accept error.
const ACCEPT_BACKOFF_START: Duration = Duration::from_millis(5);

/// Longest delay between retries of a failing accept.
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Bind a plain TCP listener.
pub async fn bind(addr: &str) -> ServerResult<TcpListener> {
    TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// Bind the first of `addrs` that the host accepts.
///
/// Later candidates are fallbacks, e.g. an IPv4 wildcard on a host without
/// IPv6. The error for the last candidate is returned if none can be bound.
pub async fn bind_first(addrs: &[String]) -> ServerResult<TcpListener> {
    let mut last_err = None;
    for addr in addrs {
        match bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                debug!("{}", e);
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| ServerError::Bind {
        addr: String::new(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "no address to listen on"),
    }))
}

/// Resolve once shutdown has been requested.
///
/// A dropped sender counts as a request: nothing could signal shutdown
/// afterwards.
pub async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

/// Serves redirects on a single listener.
pub struct RedirectServer {
    listener: TcpListener,
    handler: Arc<RedirectHandler>,
    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,
}

impl RedirectServer {
    /// Create a server for an already-bound listener.
    pub fn new(
        listener: TcpListener,
        handler: RedirectHandler,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            listener,
            handler: Arc::new(handler),
            shutdown_rx,
        }
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve connections.
    ///
    /// Returns `Ok(())` when the shutdown signal is received, or an error if
    /// the listener fails in a way that retrying won't fix. Connections
    /// already being served are left to finish on their own tasks.
    pub async fn run(self) -> ServerResult<()> {
        let mut shutdown_rx = self.shutdown_rx.clone();
        let mut backoff: Option<Duration> = None;

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            backoff = None;
                            debug!(%peer, "Accepted connection");
                            self.spawn_connection_handler(stream, peer);
                        }
                        Err(e) if is_transient_accept_error(&e) => {
                            let delay = backoff
                                .map_or(ACCEPT_BACKOFF_START, |d| (d * 2).min(ACCEPT_BACKOFF_MAX));
                            backoff = Some(delay);
                            warn!("Accept error: {}; retrying in {:?}", e, delay);
                            tokio::time::sleep(delay).await;
                        }
                        Err(e) => return Err(ServerError::Accept(e)),
                    }
                }
                _ = wait_for_shutdown(&mut shutdown_rx) => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Spawn a task to serve a single connection.
    fn spawn_connection_handler(&self, stream: TcpStream, peer: SocketAddr) {
        let handler = self.handler.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, handler).await {
                // Clients hanging up mid-request are routine
                if e.is_incomplete_message() || e.is_canceled() {
                    debug!(%peer, "Connection ended: {}", e);
                } else {
                    warn!(%peer, "Connection error: {}", e);
                }
            }
        });
    }
}

/// Serve HTTP/1.1 on one connection until the client closes it.
async fn handle_connection(
    stream: TcpStream,
    handler: Arc<RedirectHandler>,
) -> Result<(), hyper::Error> {
    let io = TokioIo::new(stream);

    let service = service_fn(move |req: Request<Incoming>| {
        let handler = handler.clone();
        async move { Ok::<_, Infallible>(handler.respond(&req)) }
    });

    http1::Builder::new().serve_connection(io, service).await
}

/// Accept errors that concern one connection or a momentary resource
/// shortage rather than the listener itself.
fn is_transient_accept_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    ) || matches!(e.raw_os_error(), Some(code) if code == nix::libc::EMFILE || code == nix::libc::ENFILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn handler() -> RedirectHandler {
        RedirectHandler::new(Url::parse("https://example.com").unwrap())
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let listener = bind("127.0.0.1:0").await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_invalid_address() {
        let err = bind("not-an-address").await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
    }

    #[tokio::test]
    async fn test_bind_first_falls_back() {
        let addrs = vec!["not-an-address".to_string(), "127.0.0.1:0".to_string()];
        let listener = bind_first(&addrs).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());
    }

    #[tokio::test]
    async fn test_bind_first_wildcards() {
        let addrs = vec!["[::]:0".to_string(), "0.0.0.0:0".to_string()];
        let listener = bind_first(&addrs).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_unspecified());
    }

    #[tokio::test]
    async fn test_bind_first_reports_last_error() {
        let addrs = vec!["bad-one".to_string(), "bad-two".to_string()];
        match bind_first(&addrs).await.unwrap_err() {
            ServerError::Bind { addr, .. } => assert_eq!(addr, "bad-two"),
            other => panic!("Expected bind error, got {:?}", other),
        }
        assert!(bind_first(&[]).await.is_err());
    }

    #[tokio::test]
    async fn test_server_stops_on_shutdown() {
        let listener = bind("127.0.0.1:0").await.unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server = RedirectServer::new(listener, handler(), shutdown_rx);
        assert!(server.local_addr().is_ok());

        let task = tokio::spawn(server.run());
        shutdown_tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_already_requested() {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).unwrap();
        wait_for_shutdown(&mut shutdown_rx).await;
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_sender_dropped() {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        drop(shutdown_tx);
        wait_for_shutdown(&mut shutdown_rx).await;
    }

    #[test]
    fn test_transient_accept_errors() {
        assert!(is_transient_accept_error(&io::Error::from(
            io::ErrorKind::ConnectionAborted
        )));
        assert!(is_transient_accept_error(&io::Error::from_raw_os_error(
            nix::libc::EMFILE
        )));
        assert!(!is_transient_accept_error(&io::Error::from(
            io::ErrorKind::InvalidInput
        )));
    }
}
