//! In-memory transport for tests
//!
//! [`FakeTransport::new`] returns the transport and a [`FakeTransportHandle`]
//! that plays the assistant service:
//!
//! ```text
//! transport.send()   -----> handle.outbound_rx   (requests the client sent)
//! handle.inbound_tx  -----> transport.receive()  (events the service emits)
//! ```

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::{mpsc, Mutex};

use crate::error::{PolyglotError, Result};
use crate::protocol::InboundEvent;
use crate::transport::Transport;

/// In-memory [`Transport`]
#[derive(Debug)]
pub struct FakeTransport {
    outbound_tx: mpsc::UnboundedSender<String>,
    inbound_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    inject_tx: mpsc::UnboundedSender<String>,
}

/// Service side of a [`FakeTransport`]
#[derive(Debug)]
pub struct FakeTransportHandle {
    /// Requests the client sent
    pub outbound_rx: mpsc::UnboundedReceiver<String>,
    /// Raw messages delivered to the client
    pub inbound_tx: mpsc::UnboundedSender<String>,
}

impl FakeTransport {
    /// Create a connected transport/handle pair
    pub fn new() -> (Self, FakeTransportHandle) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();

        let transport = Self {
            outbound_tx,
            inbound_rx: Arc::new(Mutex::new(inbound_rx)),
            inject_tx: inbound_tx.clone(),
        };
        let handle = FakeTransportHandle {
            outbound_rx,
            inbound_tx,
        };
        (transport, handle)
    }

    /// Deliver an encoded event to the client
    ///
    /// # Panics
    ///
    /// Panics if the event cannot be encoded or the inbound channel is closed.
    pub fn inject_event(&self, event: &InboundEvent) {
        let raw = event.to_json().expect("FakeTransport: failed to encode event");
        self.inject_tx
            .send(raw)
            .expect("FakeTransport: inbound channel closed");
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn send(&self, message: String) -> Result<()> {
        self.outbound_tx.send(message).map_err(|e| {
            PolyglotError::Transport(format!("fake outbound channel closed: {e}")).into()
        })
    }

    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        let rx = Arc::clone(&self.inbound_rx);
        Box::pin(futures::stream::unfold(rx, |rx| async move {
            let mut guard = rx.lock().await;
            let item = guard.recv().await?;
            drop(guard);
            Some((item, rx))
        }))
    }

    fn receive_err(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        Box::pin(futures::stream::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ids::IdGenerator;
    use futures::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn test_send_reaches_handle() {
        let (transport, mut handle) = FakeTransport::new();
        transport.send("request".to_string()).await.unwrap();
        assert_eq!(handle.outbound_rx.recv().await.unwrap(), "request");
    }

    #[tokio::test]
    async fn test_handle_and_injected_events_arrive_in_order() {
        let (transport, handle) = FakeTransport::new();
        let id = IdGenerator::new().next_id();

        handle.inbound_tx.send("raw".to_string()).unwrap();
        transport.inject_event(&InboundEvent::Typing {
            conversation_id: id,
        });

        let mut stream = transport.receive();
        let first = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.as_deref(), Some("raw"));
        assert!(second.contains("ai_typing"));
    }

    #[tokio::test]
    async fn test_send_fails_after_handle_dropped() {
        let (transport, handle) = FakeTransport::new();
        drop(handle);
        let err = transport.send("x".to_string()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PolyglotError>(),
            Some(PolyglotError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_receive_err_is_empty() {
        let (transport, _handle) = FakeTransport::new();
        assert!(transport.receive_err().next().await.is_none());
    }
}
