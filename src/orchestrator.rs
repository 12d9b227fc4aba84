//! Startup sequencing.
//!
//! Coordinates the components (redirect handler, overlay node, HTTP server)
//! once the configuration has been validated:
//!
//! ```text
//! Configured ──dev──────────────────────────────▶ DevServing
//!     │
//!     └─overlay──▶ NetworkReady ──listen :80──▶ Serving
//! ```
//!
//! Every failure is terminal. Nothing is retried; the process is expected
//! to be restarted by its supervisor.

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;

use crate::config::listen::dev_bind_addresses;
use crate::config::{Config, DevConfig, ListenMode, OVERLAY_HTTP_PORT};
use crate::overlay::{OverlayNetwork, OverlaySession, TailscaleNode};
use crate::redirect::RedirectHandler;
use crate::server::{self, RedirectServer, wait_for_shutdown};

/// Run the service until shutdown or a fatal error.
pub async fn run(config: &Config, shutdown_rx: watch::Receiver<bool>) -> Result<()> {
    let handler = RedirectHandler::new(config.target.clone());
    info!(target_url = %config.target, hostname = config.hostname(), "Redirect configured");

    match &config.mode {
        ListenMode::Dev(dev) => serve_dev(dev, handler, shutdown_rx).await,
        ListenMode::Overlay(overlay) => {
            let node = TailscaleNode::new(overlay.clone(), config.verbose);
            serve_overlay(&node, handler, shutdown_rx).await
        }
    }
}

/// Serve on a plain local address, without touching the overlay network.
pub async fn serve_dev(
    dev: &DevConfig,
    handler: RedirectHandler,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let addrs = dev_bind_addresses(&dev.listen_addr)
        .with_context(|| format!("Unable to listen on {}", dev.listen_addr))?;
    let listener = server::bind_first(&addrs)
        .await
        .with_context(|| format!("Unable to listen on {}", dev.listen_addr))?;

    info!(hostname = %dev.hostname, "Running in dev mode on {} ...", dev.listen_addr);

    RedirectServer::new(listener, handler, shutdown_rx)
        .run()
        .await
        .context("Redirect server failed")
}

/// Join the overlay network and serve on its port 80.
///
/// Joining may wait indefinitely for operator approval; a shutdown request
/// during that wait abandons the join. The session is shut down whenever
/// serving ends, successfully or not.
pub async fn serve_overlay<N: OverlayNetwork>(
    network: &N,
    handler: RedirectHandler,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let session = tokio::select! {
        session = network.start() => session.context("Failed to start overlay node")?,
        _ = wait_for_shutdown(&mut shutdown_rx) => {
            info!("Shutdown requested before the overlay node came up");
            return Ok(());
        }
    };

    let result = serve_session(&session, handler, shutdown_rx).await;
    session.shutdown().await;
    result
}

async fn serve_session<S: OverlaySession>(
    session: &S,
    handler: RedirectHandler,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let listener = session
        .listen(OVERLAY_HTTP_PORT)
        .await
        .context("Failed to open overlay listener")?;

    let identity = session.identity();
    info!("Serving http://{}/ ...", identity.hostname);
    if let Some(ref dns_name) = identity.dns_name {
        info!("Also reachable as http://{}/", dns_name);
    }

    RedirectServer::new(listener, handler, shutdown_rx)
        .run()
        .await
        .context("Redirect server failed")
}
