//! Built-in assistant service
//!
//! [`AssistantTransport`] plays the role of the remote chat server inside
//! the client process. For every `send_message` request it:
//!
//! 1. emits `ai_typing` for the request's conversation;
//! 2. asks an OpenAI-compatible `/chat/completions` endpoint for a reply,
//!    using the configured system prompt, model and token limit;
//! 3. emits `ai_response` with the reply, echoing the request timestamp, or
//!    `ai_error` with a generic message when anything goes wrong.
//!
//! Each conversation has a worker task that answers its requests one at a
//! time, in the order they were sent, so outcomes for one conversation
//! arrive in request order. Different conversations are answered
//! concurrently.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use futures::Stream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};

use crate::chat::ids::ConversationId;
use crate::config::AssistantConfig;
use crate::error::{PolyglotError, Result};
use crate::protocol::{InboundEvent, OutboundRequest};
use crate::transport::Transport;

/// Error text shown to the user when a completion fails
pub const GENERIC_ERROR: &str = "Sorry, there was an error processing your request.";

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct CompletionMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions client for one request at a time
#[derive(Debug)]
struct Completer {
    client: Client,
    config: AssistantConfig,
    api_key: Option<String>,
}

impl Completer {
    async fn complete(&self, user_message: &str) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        let request = CompletionRequest {
            model: &self.config.model,
            messages: vec![
                CompletionMessage {
                    role: "system",
                    content: &self.config.system_prompt,
                },
                CompletionMessage {
                    role: "user",
                    content: user_message,
                },
            ],
            max_tokens: self.config.max_tokens,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PolyglotError::Remote(format!(
                "completion endpoint returned {}: {}",
                status, error_text
            ))
            .into());
        }

        let body: CompletionResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PolyglotError::Remote("completion response has no message content".to_string())
                    .into()
            })
    }
}

/// One queued `send_message` request
#[derive(Debug)]
struct Job {
    message: String,
    timestamp: DateTime<Utc>,
}

/// In-process assistant speaking the chat protocol
///
/// # Examples
///
/// ```no_run
/// use polyglot_messenger::config::AssistantConfig;
/// use polyglot_messenger::transport::assistant::AssistantTransport;
///
/// let transport = AssistantTransport::new(AssistantConfig::default()).unwrap();
/// ```
#[derive(Debug)]
pub struct AssistantTransport {
    completer: Arc<Completer>,
    events_tx: mpsc::UnboundedSender<String>,
    events_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    workers: Mutex<HashMap<ConversationId, mpsc::UnboundedSender<Job>>>,
}

impl AssistantTransport {
    /// Create the assistant
    ///
    /// The API key is read from the environment variable named by
    /// `config.api_key_env`. Without one, requests are sent unauthenticated.
    ///
    /// # Errors
    ///
    /// Returns [`PolyglotError::Transport`] if the HTTP client cannot be built
    pub fn new(config: AssistantConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("polyglot-messenger/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PolyglotError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!(
                "{} is not set; assistant requests will be unauthenticated",
                config.api_key_env
            );
        }

        tracing::info!(
            "Initialized assistant: api_base={}, model={}",
            config.api_base,
            config.model
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            completer: Arc::new(Completer {
                client,
                config,
                api_key,
            }),
            events_tx,
            events_rx: Arc::new(Mutex::new(events_rx)),
            workers: Mutex::new(HashMap::new()),
        })
    }

    /// Start the worker answering requests of `conversation_id`
    fn spawn_worker(&self, conversation_id: ConversationId) -> mpsc::UnboundedSender<Job> {
        let (jobs_tx, mut jobs_rx) = mpsc::unbounded_channel::<Job>();
        let completer = Arc::clone(&self.completer);
        let events_tx = self.events_tx.clone();

        tokio::spawn(async move {
            while let Some(job) = jobs_rx.recv().await {
                let event = match completer.complete(&job.message).await {
                    Ok(reply) => InboundEvent::Response {
                        conversation_id,
                        message: reply,
                        timestamp: Some(
                            job.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                        ),
                    },
                    Err(e) => {
                        tracing::error!(
                            conversation_id = %conversation_id,
                            "Assistant request failed: {e}"
                        );
                        InboundEvent::Error {
                            conversation_id,
                            error: GENERIC_ERROR.to_string(),
                        }
                    }
                };
                emit(&events_tx, &event);
            }
        });

        tracing::debug!(conversation_id = %conversation_id, "Started assistant worker");
        jobs_tx
    }
}

fn emit(events_tx: &mpsc::UnboundedSender<String>, event: &InboundEvent) {
    match event.to_json() {
        Ok(raw) => {
            // The receiver only goes away when the client shuts down.
            let _ = events_tx.send(raw);
        }
        Err(e) => tracing::error!("Failed to encode {}: {}", event.name(), e),
    }
}

#[async_trait::async_trait]
impl Transport for AssistantTransport {
    async fn send(&self, message: String) -> Result<()> {
        let request = match OutboundRequest::from_json(&message) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Assistant ignoring undecodable request: {e}");
                return Ok(());
            }
        };

        let OutboundRequest::SendMessage {
            message,
            conversation_id,
            timestamp,
        } = request;

        emit(&self.events_tx, &InboundEvent::Typing { conversation_id });

        let mut workers = self.workers.lock().await;
        let job = Job { message, timestamp };
        let job = match workers.get(&conversation_id) {
            Some(jobs_tx) => match jobs_tx.send(job) {
                Ok(()) => return Ok(()),
                Err(mpsc::error::SendError(job)) => job,
            },
            None => job,
        };

        let jobs_tx = self.spawn_worker(conversation_id);
        jobs_tx
            .send(job)
            .map_err(|_| PolyglotError::Transport("assistant worker stopped".to_string()))?;
        workers.insert(conversation_id, jobs_tx);
        Ok(())
    }

    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        let rx = Arc::clone(&self.events_rx);
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
    use crate::protocol::parse_inbound;
    use futures::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> AssistantConfig {
        AssistantConfig {
            api_base: server.uri(),
            api_key_env: "POLYGLOT_TEST_UNSET_KEY".to_string(),
            timeout_seconds: 5,
            ..Default::default()
        }
    }

    fn request(id: ConversationId, message: &str) -> String {
        OutboundRequest::SendMessage {
            message: message.to_string(),
            conversation_id: id,
            timestamp: "2024-05-01T12:00:00Z".parse().unwrap(),
        }
        .to_json()
        .unwrap()
    }

    async fn next_event(
        stream: &mut Pin<Box<dyn Stream<Item = String> + Send + '_>>,
    ) -> InboundEvent {
        let raw = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("timed out waiting for event")
            .expect("event stream ended");
        parse_inbound(&raw).unwrap()
    }

    #[tokio::test]
    async fn test_typing_then_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "model": "gpt-3.5-turbo",
                "max_tokens": 500,
                "messages": [
                    {"role": "system", "content": "You are AMIK AI Assistant, a helpful and knowledgeable AI."},
                    {"role": "user", "content": "hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Hi there!"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let transport = AssistantTransport::new(config_for(&server)).unwrap();
        let id = IdGenerator::new().next_id();
        transport.send(request(id, "hello")).await.unwrap();

        let mut events = transport.receive();
        assert_eq!(
            next_event(&mut events).await,
            InboundEvent::Typing {
                conversation_id: id
            }
        );
        assert_eq!(
            next_event(&mut events).await,
            InboundEvent::Response {
                conversation_id: id,
                message: "Hi there!".to_string(),
                timestamp: Some("2024-05-01T12:00:00.000Z".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_typing_then_error_on_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let transport = AssistantTransport::new(config_for(&server)).unwrap();
        let id = IdGenerator::new().next_id();
        transport.send(request(id, "hello")).await.unwrap();

        let mut events = transport.receive();
        assert!(matches!(
            next_event(&mut events).await,
            InboundEvent::Typing { .. }
        ));
        assert_eq!(
            next_event(&mut events).await,
            InboundEvent::Error {
                conversation_id: id,
                error: GENERIC_ERROR.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_empty_choices_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let transport = AssistantTransport::new(config_for(&server)).unwrap();
        let id = IdGenerator::new().next_id();
        transport.send(request(id, "hello")).await.unwrap();

        let mut events = transport.receive();
        next_event(&mut events).await;
        assert!(matches!(
            next_event(&mut events).await,
            InboundEvent::Error { .. }
        ));
    }

    fn reply(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        }))
    }

    async fn mount_slow_and_fast(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("tortoise"))
            .respond_with(reply("tortoise reply").set_delay(Duration::from_millis(400)))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("hare"))
            .respond_with(reply("hare reply"))
            .mount(server)
            .await;
    }

    fn response_text(event: InboundEvent) -> (ConversationId, String) {
        match event {
            InboundEvent::Response {
                conversation_id,
                message,
                ..
            } => (conversation_id, message),
            other => panic!("expected a response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_replies_in_one_conversation_keep_request_order() {
        let server = MockServer::start().await;
        mount_slow_and_fast(&server).await;

        let transport = AssistantTransport::new(config_for(&server)).unwrap();
        let id = IdGenerator::new().next_id();
        transport.send(request(id, "tortoise")).await.unwrap();
        transport.send(request(id, "hare")).await.unwrap();

        let mut events = transport.receive();
        for _ in 0..2 {
            assert_eq!(
                next_event(&mut events).await,
                InboundEvent::Typing { conversation_id: id }
            );
        }
        assert_eq!(
            response_text(next_event(&mut events).await),
            (id, "tortoise reply".to_string())
        );
        assert_eq!(
            response_text(next_event(&mut events).await),
            (id, "hare reply".to_string())
        );
    }

    #[tokio::test]
    async fn test_conversations_are_answered_concurrently() {
        let server = MockServer::start().await;
        mount_slow_and_fast(&server).await;

        let transport = AssistantTransport::new(config_for(&server)).unwrap();
        let mut ids = IdGenerator::new();
        let slow = ids.next_id();
        let fast = ids.next_id();
        transport.send(request(slow, "tortoise")).await.unwrap();
        transport.send(request(fast, "hare")).await.unwrap();

        let mut events = transport.receive();
        next_event(&mut events).await;
        next_event(&mut events).await;
        assert_eq!(
            response_text(next_event(&mut events).await),
            (fast, "hare reply".to_string())
        );
        assert_eq!(
            response_text(next_event(&mut events).await),
            (slow, "tortoise reply".to_string())
        );
    }

    #[tokio::test]
    async fn test_undecodable_request_is_ignored() {
        let server = MockServer::start().await;
        let transport = AssistantTransport::new(config_for(&server)).unwrap();

        transport.send("{\"event\":\"wave\"}".to_string()).await.unwrap();

        let mut events = transport.receive();
        let next = tokio::time::timeout(Duration::from_millis(100), events.next()).await;
        assert!(next.is_err(), "no event expected for an undecodable request");
    }
}
