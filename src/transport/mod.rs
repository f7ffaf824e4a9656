//! Assistant transports
//!
//! A [`Transport`] carries protocol messages (see [`crate::protocol`])
//! between the chat session and an assistant service. Implementations:
//!
//! - [`stdio::StdioTransport`] -- spawns a bridge process and talks to it
//!   over stdin/stdout, one JSON object per line.
//! - [`assistant::AssistantTransport`] -- in-process assistant service that
//!   answers each request through an OpenAI-compatible chat completions
//!   endpoint.
//! - [`fake::FakeTransport`] -- in-memory pair used in tests (cfg(test)
//!   only).
//!
//! The session itself never touches a transport. It writes requests to an
//! unbounded channel; [`pump_outbound`] drains that channel into the
//! transport and [`forward_inbound`] feeds the transport's messages back to
//! the driver loop.

use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Abstraction over assistant transports
///
/// All methods are `async` or return pinned [`Stream`]s so that
/// implementations can drive I/O without blocking the Tokio executor.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Send one complete, newline-free JSON message to the service
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::PolyglotError::Transport`] if the message
    /// cannot be handed to the underlying medium.
    async fn send(&self, message: String) -> Result<()>;

    /// Stream of inbound JSON messages, one complete object per item
    ///
    /// The stream ends when the service disconnects.
    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>>;

    /// Stream of diagnostic lines (for example a bridge's stderr)
    ///
    /// Diagnostics are informational and never an error condition.
    fn receive_err(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>>;
}

/// Drain the session's outbound channel into `transport`
///
/// Send failures are logged and the message is discarded; there is no
/// retry. The task ends on cancellation or when every sender is dropped.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tokio::sync::mpsc;
/// use tokio_util::sync::CancellationToken;
/// use polyglot_messenger::config::AssistantConfig;
/// use polyglot_messenger::transport::{pump_outbound, Transport};
/// use polyglot_messenger::transport::assistant::AssistantTransport;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let transport: Arc<dyn Transport> =
///     Arc::new(AssistantTransport::new(AssistantConfig::default())?);
/// let (tx, rx) = mpsc::unbounded_channel::<String>();
/// let token = CancellationToken::new();
/// let _pump = pump_outbound(Arc::clone(&transport), rx, token.clone());
/// # drop(tx);
/// # Ok(())
/// # }
/// ```
pub fn pump_outbound(
    transport: Arc<dyn Transport>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    cancellation: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => break,

                maybe_msg = outbound_rx.recv() => {
                    let Some(message) = maybe_msg else {
                        break;
                    };
                    if let Err(e) = transport.send(message).await {
                        tracing::warn!("Failed to send request to assistant: {e}");
                    }
                }
            }
        }
        tracing::debug!("Outbound pump stopped");
    })
}

/// Forward inbound messages and diagnostics from `transport`
///
/// Messages go to `inbound_tx`; diagnostic lines are logged at `DEBUG`. The
/// task ends on cancellation, when the transport's stream ends, or when the
/// receiver is dropped.
pub fn forward_inbound(
    transport: Arc<dyn Transport>,
    inbound_tx: mpsc::UnboundedSender<String>,
    cancellation: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut messages = transport.receive();
        let mut diagnostics = transport.receive_err();
        let mut diagnostics_open = true;

        loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => break,

                maybe_msg = messages.next() => {
                    let Some(message) = maybe_msg else {
                        tracing::info!("Assistant transport closed");
                        break;
                    };
                    if inbound_tx.send(message).is_err() {
                        break;
                    }
                }

                maybe_line = diagnostics.next(), if diagnostics_open => {
                    match maybe_line {
                        Some(line) => tracing::debug!("assistant diagnostic: {line}"),
                        None => diagnostics_open = false,
                    }
                }
            }
        }
    })
}

pub mod assistant;
pub mod stdio;

#[cfg(test)]
pub mod fake;
