//! End-to-end tests: a session wired through the pumps to a real transport.

use std::sync::Arc;
use std::time::Duration;

use polyglot_messenger::config::AssistantConfig;
use polyglot_messenger::session::InboundOutcome;
use polyglot_messenger::transport::assistant::{AssistantTransport, GENERIC_ERROR};
use polyglot_messenger::transport::{forward_inbound, pump_outbound, Transport};
use polyglot_messenger::{ChatSession, ConversationStore};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Wired {
    session: ChatSession,
    inbound_rx: mpsc::UnboundedReceiver<String>,
    cancellation: CancellationToken,
}

impl Wired {
    fn new(transport: Arc<dyn Transport>, request_timeout: Option<Duration>) -> Self {
        let cancellation = CancellationToken::new();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        pump_outbound(Arc::clone(&transport), outbound_rx, cancellation.clone());
        forward_inbound(transport, inbound_tx, cancellation.clone());
        Self {
            session: ChatSession::connected(
                ConversationStore::default(),
                outbound_tx,
                request_timeout,
            ),
            inbound_rx,
            cancellation,
        }
    }

    /// Apply the next inbound message to the session
    async fn step(&mut self) -> InboundOutcome {
        let raw = tokio::time::timeout(Duration::from_secs(5), self.inbound_rx.recv())
            .await
            .expect("timed out waiting for inbound message")
            .expect("inbound channel closed");
        self.session.handle_inbound(&raw)
    }
}

impl Drop for Wired {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

fn assistant_for(server: &MockServer) -> Arc<dyn Transport> {
    let config = AssistantConfig {
        api_base: server.uri(),
        api_key_env: "POLYGLOT_TEST_UNSET_KEY".to_string(),
        timeout_seconds: 5,
        ..Default::default()
    };
    Arc::new(AssistantTransport::new(config).unwrap())
}

#[tokio::test]
async fn test_reply_lands_in_active_conversation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Paris."}}]
        })))
        .mount(&server)
        .await;

    let mut wired = Wired::new(assistant_for(&server), None);
    let id = wired
        .session
        .send_user_message("Capital of France?")
        .unwrap()
        .unwrap();
    assert_eq!(wired.session.pending_requests(id), 1);

    assert_eq!(wired.step().await, InboundOutcome::Displayed);
    assert_eq!(wired.session.typing_indicator(), Some(id));

    assert_eq!(wired.step().await, InboundOutcome::Displayed);
    assert_eq!(wired.session.typing_indicator(), None);
    assert_eq!(wired.session.pending_requests(id), 0);

    let log = wired.session.store().active().log();
    assert_eq!(log.len(), 2);
    assert_eq!(log.last().unwrap().content(), "Paris.");
}

#[tokio::test]
async fn test_reply_for_background_conversation_is_buffered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "choices": [{"message": {"role": "assistant", "content": "Done."}}]
                }))
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&server)
        .await;

    let mut wired = Wired::new(assistant_for(&server), None);
    let asked = wired.session.send_user_message("Summarize this").unwrap().unwrap();
    let other = wired.session.new_conversation();

    // Typing for a background conversation is not shown.
    assert_eq!(wired.step().await, InboundOutcome::Ignored);
    assert_eq!(wired.step().await, InboundOutcome::Buffered);

    let store = wired.session.store();
    assert_eq!(store.active_id(), other);
    assert!(store.active().log().is_empty());
    assert_eq!(store.conversation(asked).unwrap().log().len(), 2);
    assert_eq!(store.list_summaries()[0].id, asked);
}

#[tokio::test]
async fn test_reply_for_deleted_conversation_is_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "choices": [{"message": {"role": "assistant", "content": "Too late."}}]
                }))
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&server)
        .await;

    let mut wired = Wired::new(assistant_for(&server), None);
    let asked = wired.session.send_user_message("Anyone there?").unwrap().unwrap();
    wired.session.delete_conversation(asked).unwrap();

    assert_eq!(wired.step().await, InboundOutcome::Dropped);
    assert_eq!(wired.step().await, InboundOutcome::Dropped);
    assert_eq!(wired.session.store().conversation_count(), 1);
    assert!(wired.session.store().active().log().is_empty());
}

#[tokio::test]
async fn test_remote_failure_becomes_error_annotation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut wired = Wired::new(assistant_for(&server), None);
    let id = wired.session.send_user_message("hello").unwrap().unwrap();

    wired.step().await;
    assert_eq!(wired.step().await, InboundOutcome::Displayed);

    let annotation = wired.session.error_annotation().unwrap();
    assert_eq!(annotation.conversation_id, id);
    assert_eq!(annotation.message, GENERIC_ERROR);
    // Errors are not part of the transcript.
    assert_eq!(wired.session.store().active().log().len(), 1);
    assert_eq!(wired.session.typing_indicator(), None);
}

#[tokio::test]
async fn test_unanswered_request_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "choices": [{"message": {"role": "assistant", "content": "Eventually."}}]
                }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let mut wired = Wired::new(assistant_for(&server), Some(Duration::from_millis(50)));
    let id = wired.session.send_user_message("slow one").unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        wired.session.expire_overdue(std::time::Instant::now()),
        vec![id]
    );
    assert_eq!(
        wired.session.error_annotation().unwrap().message,
        "The assistant did not respond in time."
    );

    // The late answer is still kept.
    wired.step().await;
    assert_eq!(wired.step().await, InboundOutcome::Displayed);
    assert_eq!(wired.session.store().active().log().len(), 2);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_bridge_process_round_trip() {
    use polyglot_messenger::transport::stdio::StdioTransport;
    use std::collections::HashMap;

    // Answer every request with a response naming the same conversation.
    let script = r#"sed -u 's/.*"conversationId":"\([^"]*\)".*/{"event":"ai_response","conversationId":"\1","message":"pong"}/'"#;
    let transport = StdioTransport::spawn(
        "sh".into(),
        vec!["-c".to_string(), script.to_string()],
        HashMap::new(),
    )
    .unwrap();

    let mut wired = Wired::new(Arc::new(transport), None);
    let id = wired.session.send_user_message("ping").unwrap().unwrap();

    assert_eq!(wired.step().await, InboundOutcome::Displayed);
    let log = wired.session.store().conversation(id).unwrap().log();
    assert_eq!(log.last().unwrap().content(), "pong");
}
