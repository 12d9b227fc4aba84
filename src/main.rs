//! tailnet-redirect: HTTP redirect service for a private tailnet.
//!
//! Entry point. Parses the CLI, loads configuration, initializes logging and
//! runs the service on a Tokio runtime until a fatal error or a shutdown
//! signal. Startup failures are logged once and the process exits with
//! status 1.

use anyhow::{Context, Result};
use std::process;
use clap::Parser;
use tailnet_redirect::{cli::Cli, config::ConfigLoader, orchestrator};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Configuration is loaded before logging is set up because a config file
    // may switch on verbose output; errors are reported once logging exists.
    let config = ConfigLoader::new().load(&cli);
    let verbose = config.as_ref().map_or(cli.verbose, |c| c.verbose);
    init_tracing(verbose)?;

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };
    debug!("Loaded configuration: {:?}", config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let result = runtime.block_on(async {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        });

        orchestrator::run(&config, shutdown_rx).await
    });

    // `process::exit` skips destructors, so remaining tasks and any child
    // processes they own are torn down first
    drop(runtime);

    if let Err(e) = result {
        error!("{:#}", e);
        process::exit(1);
    }
    Ok(())
}

/// Initialize the tracing subscriber.
///
/// Logs go to stderr. `RUST_LOG` takes precedence when set; otherwise the
/// level is `info`, or `debug` with `--verbose`.
fn init_tracing(verbose: bool) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}
