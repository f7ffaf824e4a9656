//! Stdio transport for bridge processes
//!
//! [`StdioTransport`] spawns a bridge: any program that speaks the chat
//! protocol on its standard streams. This is how the client reaches a
//! service it cannot talk to directly, such as a WebSocket server wrapped by
//! a small relay script.
//!
//! # Protocol
//!
//! - Requests are written to the bridge's stdin, one JSON object per line.
//! - Events are read from the bridge's stdout, one JSON object per line.
//!   Blank lines are skipped.
//! - The bridge's stderr is diagnostic only. It is exposed through
//!   [`Transport::receive_err`]; [`crate::transport::forward_inbound`] logs
//!   it at `DEBUG`.
//!
//! # Lifecycle
//!
//! Three background Tokio tasks start in [`StdioTransport::spawn`]: a stdin
//! writer, a stdout reader and a stderr reader. Dropping the transport sends
//! a best-effort SIGTERM (Unix) or `start_kill` (elsewhere) to the bridge.

use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;

use futures::Stream;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};

use crate::error::{PolyglotError, Result};
use crate::transport::Transport;

/// Transport that drives a bridge child process
///
/// # Examples
///
/// ```no_run
/// use std::collections::HashMap;
/// use polyglot_messenger::transport::stdio::StdioTransport;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let transport = StdioTransport::spawn(
///     "python3".into(),
///     vec!["bridge.py".into(), "ws://localhost:5000".into()],
///     HashMap::new(),
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct StdioTransport {
    stdin_tx: mpsc::UnboundedSender<String>,
    stdout_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    stderr_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    child: Arc<Mutex<Child>>,
}

impl StdioTransport {
    /// Spawn a bridge process and wire up its standard streams
    ///
    /// The bridge inherits the parent environment, extended with `env`.
    ///
    /// # Arguments
    ///
    /// * `command` - Bridge executable
    /// * `args` - Arguments passed to the bridge
    /// * `env` - Extra environment variables for the bridge
    ///
    /// # Errors
    ///
    /// Returns [`PolyglotError::Transport`] if the process cannot be spawned
    /// or its pipes are unavailable.
    pub fn spawn(
        command: PathBuf,
        args: Vec<String>,
        env: HashMap<String, String>,
    ) -> Result<Self> {
        let mut cmd = Command::new(&command);
        cmd.args(&args)
            .envs(&env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            PolyglotError::Transport(format!(
                "failed to spawn bridge `{}`: {}",
                command.display(),
                e
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PolyglotError::Transport("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PolyglotError::Transport("bridge stdout unavailable".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| PolyglotError::Transport("bridge stderr unavailable".into()))?;

        tracing::info!(bridge = %command.display(), pid = ?child.id(), "Spawned bridge");

        let (stdin_tx, mut stdin_rx) = mpsc::unbounded_channel::<String>();
        let (stdout_tx, stdout_rx) = mpsc::unbounded_channel::<String>();
        let (stderr_tx, stderr_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(msg) = stdin_rx.recv().await {
                let line = format!("{}\n", msg);
                if let Err(e) = stdin.write_all(line.as_bytes()).await {
                    tracing::warn!("Bridge stdin closed: {e}");
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if stdout_tx.send(line.to_string()).is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if stderr_tx.send(line).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            stdin_tx,
            stdout_rx: Arc::new(Mutex::new(stdout_rx)),
            stderr_rx: Arc::new(Mutex::new(stderr_rx)),
            child: Arc::new(Mutex::new(child)),
        })
    }
}

fn drain(
    rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
) -> Pin<Box<dyn Stream<Item = String> + Send + 'static>> {
    Box::pin(futures::stream::unfold(rx, |rx| async move {
        let mut guard = rx.lock().await;
        let item = guard.recv().await?;
        drop(guard);
        Some((item, rx))
    }))
}

#[async_trait::async_trait]
impl Transport for StdioTransport {
    async fn send(&self, message: String) -> Result<()> {
        self.stdin_tx.send(message).map_err(|e| {
            PolyglotError::Transport(format!("bridge stdin channel closed: {e}")).into()
        })
    }

    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        drain(Arc::clone(&self.stdout_rx))
    }

    fn receive_err(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        drain(Arc::clone(&self.stderr_rx))
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        // If the lock is held elsewhere the OS reaps the bridge on exit.
        if let Ok(child) = self.child.try_lock() {
            #[cfg(unix)]
            {
                if let Some(pid) = child.id() {
                    // SAFETY: pid comes from a live tokio::process::Child.
                    unsafe {
                        libc::kill(pid as libc::pid_t, libc::SIGTERM);
                    }
                }
            }
            #[cfg(not(unix))]
            {
                let mut child = child;
                let _ = child.start_kill();
            }
        }
    }
}
