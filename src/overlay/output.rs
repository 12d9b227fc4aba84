//! Forwarding of overlay client output into the log.
//!
//! When verbose, every line the overlay programs print is logged. Otherwise
//! the output is dropped, except for lines that carry the interactive login
//! link: those are always logged at `warn`, since the node cannot join the
//! network until an operator opens the link.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Whether a line is part of the interactive login prompt.
pub fn is_login_line(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("To authenticate")
        || line.starts_with("https://")
        || line.starts_with("http://")
        || line.contains("AuthURL is")
}

/// Log one line of output from `program`.
pub fn log_line(program: &str, line: &str, verbose: bool) {
    if line.trim().is_empty() {
        return;
    }
    if is_login_line(line) {
        warn!(program, "{}", line.trim());
    } else if verbose {
        info!(program, "{}", line.trim_end());
    }
}

/// Spawn a task that logs every line read from `reader`.
pub fn spawn_forwarder<R>(program: &str, reader: R, verbose: bool) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let program = program.to_string();

    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => log_line(&program, &line, verbose),
                Ok(None) => break,
                Err(e) => {
                    debug!(program = %program, "Stopped reading output: {}", e);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::Level;

    #[test]
    fn test_login_lines() {
        assert!(is_login_line("To authenticate, visit:"));
        assert!(is_login_line("\thttps://login.tailscale.com/a/1b2c3d"));
        assert!(is_login_line(
            "control: AuthURL is https://login.tailscale.com/a/1b2c3d"
        ));
    }

    #[test]
    fn test_other_lines() {
        assert!(!is_login_line("Success."));
        assert!(!is_login_line("wgengine: Reconfig: configuring userspace WireGuard"));
        assert!(!is_login_line(""));
    }

    /// Log output captured from a test subscriber.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn subscriber(writer: Captured) -> impl tracing::Subscriber + Send + Sync {
        tracing_subscriber::fmt()
            .with_max_level(Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish()
    }

    impl Captured {
        fn output(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }

        fn has_line(&self, level: &str, text: &str) -> bool {
            self.output()
                .lines()
                .any(|l| l.contains(level) && l.contains(text))
        }
    }

    fn capture_lines(lines: &[&str], verbose: bool) -> Captured {
        let captured = Captured::default();
        tracing::subscriber::with_default(subscriber(captured.clone()), || {
            for line in lines {
                log_line("tailscale", line, verbose);
            }
        });
        captured
    }

    const OUTPUT: [&str; 4] = [
        "first",
        "To authenticate, visit:",
        "",
        "\thttps://login.example/a/x",
    ];

    #[test]
    fn test_quiet_logs_only_login_lines() {
        let captured = capture_lines(&OUTPUT, false);

        assert!(captured.has_line("WARN", "To authenticate, visit:"));
        assert!(captured.has_line("WARN", "https://login.example/a/x"));
        assert!(!captured.output().contains("first"));
    }

    #[test]
    fn test_verbose_logs_everything() {
        let captured = capture_lines(&OUTPUT, true);

        assert!(captured.has_line("INFO", "first"));
        assert!(captured.has_line("WARN", "https://login.example/a/x"));
        assert!(!captured.has_line("WARN", "first"));
    }

    #[test]
    fn test_blank_lines_dropped() {
        let captured = capture_lines(&["", "   "], true);
        assert!(captured.output().is_empty());
    }

    #[tokio::test]
    async fn test_forwarder_logs_login_link() {
        let captured = Captured::default();
        let _guard = tracing::subscriber::set_default(subscriber(captured.clone()));

        let input: &[u8] = b"first\nTo authenticate, visit:\n\n\thttps://login.example/a/x\n";
        spawn_forwarder("tailscale", input, false).await.unwrap();

        assert!(captured.has_line("WARN", "https://login.example/a/x"));
        assert!(captured.has_line("WARN", "tailscale"));
        assert!(!captured.output().contains("first"));
    }
}
