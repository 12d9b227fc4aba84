//! Tailscale implementation of the overlay network.
//!
//! The node runs as a private `tailscaled` process with its own state
//! directory, control socket and kernel TUN interface, so it never touches a
//! system-wide Tailscale installation.
//!
//! # Startup
//!
//! 1. Create the state directory (mode 0700).
//! 2. Spawn `tailscaled --tun=<name> --statedir=<dir> --socket=<sock>`.
//! 3. Wait for the control socket to appear.
//! 4. Run `tailscale up --hostname=<name> --login-server=<url>`. On first
//!    run this blocks until an operator approves the node via the login
//!    link, which is always logged.
//! 5. Read `tailscale status --json` and require the backend to be running.
//!
//! The node's tailnet addresses live on the TUN interface, and
//! [`TailscaleSession::listen`] binds one of them. Only that socket is
//! reachable from the tailnet; loopback services on the host are not.
//! Userspace networking is never used, since it forwards tailnet traffic to
//! host loopback on every port. Creating the TUN interface and binding port
//! 80 both need `CAP_NET_ADMIN`/`CAP_NET_BIND_SERVICE` (or root).

use std::fs;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::net::TcpListener;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::error::{OverlayError, OverlayResult};
use super::output::{log_line, spawn_forwarder};
use super::status::StatusReport;
use super::{NodeIdentity, OverlayNetwork, OverlaySession};
use crate::config::OverlayConfig;

/// Default daemon binary, resolved via `PATH`.
pub const DEFAULT_DAEMON_BINARY: &str = "tailscaled";

/// Default CLI binary, resolved via `PATH`.
pub const DEFAULT_CLI_BINARY: &str = "tailscale";

/// Control socket filename inside the state directory.
pub const SOCKET_FILE: &str = "tailscaled.sock";

/// How long to wait for the daemon's control socket.
const SOCKET_WAIT_TIMEOUT: Duration = Duration::from_secs(15);

/// Poll interval while waiting for the control socket.
const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long to wait for the node's address to show up on the interface.
const ADDRESS_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Grace period between SIGTERM and SIGKILL on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A Tailscale node driven through `tailscaled` and the `tailscale` CLI.
#[derive(Debug, Clone)]
pub struct TailscaleNode {
    config: OverlayConfig,
    verbose: bool,
    daemon_binary: PathBuf,
    cli_binary: PathBuf,
}

impl TailscaleNode {
    /// Create a node using the binaries found on `PATH`.
    pub fn new(config: OverlayConfig, verbose: bool) -> Self {
        Self {
            config,
            verbose,
            daemon_binary: PathBuf::from(DEFAULT_DAEMON_BINARY),
            cli_binary: PathBuf::from(DEFAULT_CLI_BINARY),
        }
    }

    /// Use specific `tailscaled` and `tailscale` binaries.
    #[must_use]
    pub fn with_binaries(mut self, daemon: impl Into<PathBuf>, cli: impl Into<PathBuf>) -> Self {
        self.daemon_binary = daemon.into();
        self.cli_binary = cli.into();
        self
    }

    /// Path of the daemon's control socket.
    pub fn socket_path(&self) -> PathBuf {
        self.config.state_dir.join(SOCKET_FILE)
    }

    /// Arguments passed to `tailscaled`.
    pub fn daemon_args(&self) -> Vec<String> {
        vec![
            format!("--tun={}", self.config.tun_name),
            format!("--statedir={}", self.config.state_dir.display()),
            format!("--socket={}", self.socket_path().display()),
        ]
    }

    /// Arguments passed to `tailscale` to bring the node up.
    pub fn up_args(&self) -> Vec<String> {
        vec![
            format!("--socket={}", self.socket_path().display()),
            "up".to_string(),
            format!("--hostname={}", self.config.hostname),
            format!("--login-server={}", self.config.control_url),
        ]
    }

    /// Create the state directory, readable only by the current user.
    fn prepare_state_dir(&self) -> OverlayResult<()> {
        let dir = &self.config.state_dir;
        let state_dir_error = |source| OverlayError::StateDir {
            path: dir.clone(),
            source,
        };

        fs::create_dir_all(dir).map_err(state_dir_error)?;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700)).map_err(state_dir_error)?;

        // A socket left behind by a previous run would look like a live daemon
        let socket = self.socket_path();
        if socket.exists() {
            debug!("Removing stale socket {:?}", socket);
            fs::remove_file(&socket).map_err(state_dir_error)?;
        }
        Ok(())
    }

    fn spawn_daemon(&self) -> OverlayResult<Child> {
        let program = self.daemon_binary.display().to_string();
        debug!("Starting {} with args {:?}", program, self.daemon_args());

        let mut child = Command::new(&self.daemon_binary)
            .args(self.daemon_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| OverlayError::Spawn {
                program: program.clone(),
                source,
            })?;

        if let Some(stdout) = child.stdout.take() {
            spawn_forwarder(&program, stdout, self.verbose);
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_forwarder(&program, stderr, self.verbose);
        }

        Ok(child)
    }

    /// Wait until the daemon's control socket exists.
    async fn wait_for_socket(&self, daemon: &mut Child) -> OverlayResult<()> {
        let socket = self.socket_path();
        let deadline = tokio::time::Instant::now() + SOCKET_WAIT_TIMEOUT;

        loop {
            if socket.exists() {
                debug!("Daemon socket ready at {:?}", socket);
                return Ok(());
            }

            let exited = daemon.try_wait().map_err(|source| OverlayError::Wait {
                program: self.daemon_binary.display().to_string(),
                source,
            })?;
            if let Some(status) = exited {
                return Err(OverlayError::DaemonExited(status));
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(OverlayError::SocketTimeout(socket));
            }
            tokio::time::sleep(SOCKET_POLL_INTERVAL).await;
        }
    }

    /// Run `tailscale up`, streaming its output so the login link shows up
    /// while it waits for approval.
    async fn bring_up(&self) -> OverlayResult<()> {
        let program = self.cli_binary.display().to_string();

        let mut child = Command::new(&self.cli_binary)
            .args(self.up_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| OverlayError::Spawn {
                program: program.clone(),
                source,
            })?;

        let forwarders: Vec<_> = [
            child.stdout.take().map(|out| spawn_forwarder(&program, out, self.verbose)),
            child.stderr.take().map(|err| spawn_forwarder(&program, err, self.verbose)),
        ]
        .into_iter()
        .flatten()
        .collect();

        let status = child.wait().await.map_err(|source| OverlayError::Wait {
            program: program.clone(),
            source,
        })?;

        for forwarder in forwarders {
            let _ = forwarder.await;
        }

        if !status.success() {
            return Err(OverlayError::UpFailed(status));
        }
        Ok(())
    }

    /// Query the node's status.
    async fn status(&self) -> OverlayResult<StatusReport> {
        let program = self.cli_binary.display().to_string();

        let output = Command::new(&self.cli_binary)
            .arg(format!("--socket={}", self.socket_path().display()))
            .args(["status", "--json"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| OverlayError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OverlayError::Status(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            )));
        }

        StatusReport::parse(&String::from_utf8_lossy(&output.stdout))
    }
}

impl OverlayNetwork for TailscaleNode {
    type Session = TailscaleSession;

    async fn start(&self) -> OverlayResult<TailscaleSession> {
        info!(
            hostname = %self.config.hostname,
            control_url = %self.config.control_url,
            state_dir = %self.config.state_dir.display(),
            "Starting overlay node"
        );

        self.prepare_state_dir()?;
        let mut daemon = self.spawn_daemon()?;
        self.wait_for_socket(&mut daemon).await?;
        self.bring_up().await?;

        let report = self.status().await?;
        if !report.auth_url.is_empty() {
            log_line(DEFAULT_CLI_BINARY, &report.auth_url, self.verbose);
        }
        let identity = report.into_identity(&self.config.hostname)?;

        info!(
            hostname = %identity.hostname,
            dns_name = identity.dns_name.as_deref().unwrap_or("-"),
            addresses = ?identity.addresses,
            "Overlay node running"
        );

        Ok(TailscaleSession { daemon, identity })
    }
}

/// Pick the overlay address to listen on, preferring IPv4.
pub fn listen_address(identity: &NodeIdentity, port: u16) -> OverlayResult<SocketAddr> {
    identity
        .addresses
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| identity.addresses.first())
        .map(|ip| SocketAddr::new(*ip, port))
        .ok_or_else(|| OverlayError::NoAddress(identity.hostname.clone()))
}

/// A running Tailscale node. Dropping it kills the daemon.
#[derive(Debug)]
pub struct TailscaleSession {
    daemon: Child,
    identity: NodeIdentity,
}

impl TailscaleSession {
    /// Send a signal to the daemon.
    pub fn signal(&self, signal: Signal) -> OverlayResult<()> {
        match self.daemon.id() {
            Some(pid) => kill(Pid::from_raw(pid as i32), signal).map_err(OverlayError::Signal),
            // Already reaped
            None => Ok(()),
        }
    }
}

impl OverlaySession for TailscaleSession {
    fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    fn listen(&self, port: u16) -> impl Future<Output = OverlayResult<TcpListener>> + Send {
        let addr = listen_address(&self.identity, port);
        async move {
            let addr = addr?;
            let deadline = tokio::time::Instant::now() + ADDRESS_WAIT_TIMEOUT;

            // The daemon may report Running a moment before the address is
            // configured on the interface
            loop {
                match TcpListener::bind(addr).await {
                    Ok(listener) => {
                        debug!(%addr, "Listening on overlay address");
                        return Ok(listener);
                    }
                    Err(e)
                        if e.kind() == io::ErrorKind::AddrNotAvailable
                            && tokio::time::Instant::now() < deadline =>
                    {
                        tokio::time::sleep(SOCKET_POLL_INTERVAL).await;
                    }
                    Err(source) => return Err(OverlayError::Listen { port, source }),
                }
            }
        }
    }

    async fn shutdown(mut self) {
        if let Err(e) = self.signal(Signal::SIGTERM) {
            warn!("Failed to stop overlay daemon: {}", e);
        }

        match tokio::time::timeout(SHUTDOWN_GRACE, self.daemon.wait()).await {
            Ok(Ok(status)) => debug!("Overlay daemon exited ({})", status),
            Ok(Err(e)) => warn!("Failed to wait for overlay daemon: {}", e),
            Err(_) => {
                warn!("Overlay daemon did not exit in time, killing it");
                let _ = self.daemon.kill().await;
            }
        }
    }
}
