//! Chat session: the store wired to an assistant channel
//!
//! [`ChatSession`] is the single entry point the front-end drives. It owns
//! the [`ConversationStore`], turns user input into outbound requests, and
//! applies inbound events to the conversation they name.
//!
//! # Design
//!
//! - Outbound requests are written to an unbounded channel as JSON strings.
//!   Sending never waits; a transport task drains the channel (see
//!   [`crate::transport::pump_outbound`]).
//! - Inbound events are correlated by `conversationId`, never by the active
//!   pointer. A response for a background conversation is appended to that
//!   conversation's log; a response for a deleted conversation is dropped.
//! - Typing indicators and error annotations are transient. They belong to
//!   the displayed conversation and are cleared whenever it changes.
//! - Each sent request leaves a pending ticket. With a request timeout
//!   configured, [`ChatSession::expire_overdue`] turns overdue tickets into
//!   synthetic error events. An expired ticket leaves a tombstone, so the
//!   late answer to that request is not mistaken for the answer to the
//!   next one.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc;

use crate::chat::ids::ConversationId;
use crate::chat::log::{Author, Turn};
use crate::chat::notify::{Notification, PresentationSink, SubscriptionId};
use crate::chat::search::SearchResult;
use crate::chat::store::{ConversationStore, ConversationSummary};
use crate::error::{PolyglotError, Result};
use crate::locale::Language;
use crate::protocol::{self, InboundEvent, OutboundRequest};

/// What [`ChatSession::apply_event`] did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    /// The event changed what is shown for the active conversation
    Displayed,
    /// A response was stored in a background conversation
    Buffered,
    /// A transient event for a background conversation was discarded
    Ignored,
    /// The event was malformed or named an unknown conversation
    Dropped,
}

/// Inline error shown under the active conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorAnnotation {
    /// Conversation the error belongs to
    pub conversation_id: ConversationId,
    /// Text to display
    pub message: String,
}

/// An emitted request awaiting its response or error
#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    deadline: Option<Instant>,
}

/// Session state manager
///
/// # Examples
///
/// ```
/// use polyglot_messenger::chat::store::ConversationStore;
/// use polyglot_messenger::session::{ChatSession, InboundOutcome};
/// use tokio::sync::mpsc;
///
/// let (tx, mut rx) = mpsc::unbounded_channel();
/// let mut session = ChatSession::connected(ConversationStore::default(), tx, None);
///
/// let id = session.send_user_message("hello").unwrap().unwrap();
/// let request = rx.try_recv().unwrap();
/// assert!(request.contains(&id.to_string()));
///
/// let reply = format!(
///     r#"{{"event":"ai_response","conversationId":"{id}","message":"hi!"}}"#
/// );
/// assert_eq!(session.handle_inbound(&reply), InboundOutcome::Displayed);
/// assert_eq!(session.store().active().log().len(), 2);
/// ```
#[derive(Debug)]
pub struct ChatSession {
    store: ConversationStore,
    outbound: Option<mpsc::UnboundedSender<String>>,
    request_timeout: Option<Duration>,
    pending: HashMap<ConversationId, VecDeque<PendingRequest>>,
    /// Expired requests per conversation whose late answer is still due
    expired: HashMap<ConversationId, usize>,
    typing: Option<ConversationId>,
    annotation: Option<ErrorAnnotation>,
}

impl ChatSession {
    /// Create a session without an assistant
    ///
    /// User turns are stored; nothing is sent.
    pub fn new(store: ConversationStore) -> Self {
        Self {
            store,
            outbound: None,
            request_timeout: None,
            pending: HashMap::new(),
            expired: HashMap::new(),
            typing: None,
            annotation: None,
        }
    }

    /// Create a session that sends requests on `outbound`
    ///
    /// # Arguments
    ///
    /// * `store` - Conversation store to drive
    /// * `outbound` - Sender half of the outbound request channel
    /// * `request_timeout` - How long a request may stay unanswered before a
    ///   synthetic error is raised, or `None` to wait forever
    pub fn connected(
        store: ConversationStore,
        outbound: mpsc::UnboundedSender<String>,
        request_timeout: Option<Duration>,
    ) -> Self {
        Self {
            outbound: Some(outbound),
            request_timeout,
            ..Self::new(store)
        }
    }

    /// Whether requests are sent to an assistant
    pub fn is_connected(&self) -> bool {
        self.outbound.is_some()
    }

    /// Send user input on the active conversation
    ///
    /// The input is trimmed; blank input is ignored. Otherwise a user turn
    /// is appended to the active conversation and, when connected, a
    /// `send_message` request is emitted without waiting for an answer.
    ///
    /// A closed outbound channel is reported as an error annotation on the
    /// conversation, not as an error of this call.
    ///
    /// # Returns
    ///
    /// The conversation the turn was appended to, or `None` for blank input
    pub fn send_user_message(&mut self, content: &str) -> Result<Option<ConversationId>> {
        let content = content.trim();
        if content.is_empty() {
            tracing::debug!("Ignoring blank message");
            return Ok(None);
        }

        let id = self.store.active_id();
        self.store.append_turn(id, content, Author::User)?;

        let Some(outbound) = &self.outbound else {
            return Ok(Some(id));
        };

        let timestamp = self
            .store
            .active()
            .log()
            .last()
            .map(Turn::timestamp)
            .unwrap_or_else(Utc::now);
        let request = OutboundRequest::SendMessage {
            message: content.to_string(),
            conversation_id: id,
            timestamp,
        };

        if outbound.send(request.to_json()?).is_err() {
            tracing::warn!(conversation_id = %id, "Outbound channel closed; request not sent");
            let error = PolyglotError::Transport("assistant connection closed".to_string());
            self.show_annotation(id, error.to_string());
            return Ok(Some(id));
        }

        let deadline = self.request_timeout.map(|t| Instant::now() + t);
        self.pending
            .entry(id)
            .or_default()
            .push_back(PendingRequest { deadline });
        tracing::debug!(conversation_id = %id, "Sent request");

        Ok(Some(id))
    }

    /// Decode and apply one raw inbound message
    ///
    /// Malformed messages are logged and dropped.
    pub fn handle_inbound(&mut self, raw: &str) -> InboundOutcome {
        match protocol::parse_inbound(raw) {
            Ok(event) => self.apply_event(event),
            Err(e) => {
                tracing::warn!("Dropping inbound message: {e}");
                InboundOutcome::Dropped
            }
        }
    }

    /// Apply a decoded inbound event to the conversation it names
    pub fn apply_event(&mut self, event: InboundEvent) -> InboundOutcome {
        let id = event.conversation_id();
        if !self.store.contains(id) {
            tracing::warn!(
                conversation_id = %id,
                event = event.name(),
                "Dropping event for unknown conversation"
            );
            self.forget_requests(id);
            return InboundOutcome::Dropped;
        }

        let is_active = id == self.store.active_id();
        match event {
            InboundEvent::Typing { .. } => {
                if !is_active {
                    return InboundOutcome::Ignored;
                }
                if self.typing != Some(id) {
                    self.typing = Some(id);
                    self.store.emit(Notification::Typing {
                        conversation_id: id,
                        visible: true,
                    });
                }
                InboundOutcome::Displayed
            }
            InboundEvent::Response { message, .. } => {
                self.complete_pending(id);
                self.hide_typing(id);
                if let Err(e) = self.store.append_turn(id, message, Author::Assistant) {
                    tracing::warn!(conversation_id = %id, "Dropping response: {e}");
                    return InboundOutcome::Dropped;
                }
                if is_active {
                    InboundOutcome::Displayed
                } else {
                    tracing::debug!(conversation_id = %id, "Buffered background response");
                    InboundOutcome::Buffered
                }
            }
            InboundEvent::Error { error, .. } => {
                self.complete_pending(id);
                self.surface_error(id, error)
            }
        }
    }

    /// Raise a timeout error for every request past its deadline
    ///
    /// Overdue tickets are removed, so a request times out at most once. A
    /// response that arrives later is still appended.
    ///
    /// # Returns
    ///
    /// The conversations that had an overdue request, in id order
    pub fn expire_overdue(&mut self, now: Instant) -> Vec<ConversationId> {
        let mut expired = Vec::new();
        for (id, queue) in self.pending.iter_mut() {
            let before = queue.len();
            queue.retain(|req| !matches!(req.deadline, Some(deadline) if deadline <= now));
            let overdue = before - queue.len();
            if overdue > 0 {
                *self.expired.entry(*id).or_default() += overdue;
                expired.push(*id);
            }
        }
        self.pending.retain(|_, queue| !queue.is_empty());
        expired.sort();

        let message = self.store.language().translations().request_timed_out;
        for id in &expired {
            tracing::warn!(conversation_id = %id, "Request timed out");
            self.surface_error(*id, message.to_string());
        }
        expired
    }

    /// Start a new conversation and display it
    pub fn new_conversation(&mut self) -> ConversationId {
        let id = self.store.create_conversation();
        self.clear_transient();
        id
    }

    /// Display conversation `id`
    ///
    /// # Errors
    ///
    /// Returns [`PolyglotError::NotFound`] if `id` is unknown.
    pub fn switch_to(&mut self, id: ConversationId) -> Result<()> {
        let previous = self.store.active_id();
        self.store.set_active(id)?;
        if previous != id {
            self.clear_transient();
        }
        Ok(())
    }

    /// Delete conversation `id`
    ///
    /// Pending requests of the conversation are forgotten; their late
    /// answers are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`PolyglotError::NotFound`] if `id` is unknown.
    pub fn delete_conversation(&mut self, id: ConversationId) -> Result<()> {
        let previous = self.store.active_id();
        self.store.delete_conversation(id)?;
        self.forget_requests(id);
        if previous != self.store.active_id() {
            self.clear_transient();
        }
        Ok(())
    }

    /// Change the display language
    pub fn set_language(&mut self, language: Language) {
        self.store.set_language(language);
    }

    /// Filter the history list by name
    pub fn search(&self, query: &str) -> SearchResult {
        self.store.filter(query)
    }

    /// History list, most recently active first
    pub fn summaries(&self) -> Vec<ConversationSummary> {
        self.store.list_summaries()
    }

    /// Register a presentation sink
    pub fn subscribe(&mut self, sink: Box<dyn PresentationSink>) -> SubscriptionId {
        self.store.subscribe(sink)
    }

    /// The underlying store
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Conversation showing a typing indicator, if any
    pub fn typing_indicator(&self) -> Option<ConversationId> {
        self.typing
    }

    /// Error annotation under the active conversation, if any
    pub fn error_annotation(&self) -> Option<&ErrorAnnotation> {
        self.annotation.as_ref()
    }

    /// Number of unanswered requests for `id`
    pub fn pending_requests(&self, id: ConversationId) -> usize {
        self.pending.get(&id).map_or(0, VecDeque::len)
    }

    /// Account for one terminal event of `id`
    ///
    /// Answers arrive in request order, so an outstanding tombstone belongs
    /// to an older request than any live ticket and is consumed first.
    fn complete_pending(&mut self, id: ConversationId) {
        if let Some(tombstones) = self.expired.get_mut(&id) {
            *tombstones -= 1;
            if *tombstones == 0 {
                self.expired.remove(&id);
            }
            return;
        }
        if let Some(queue) = self.pending.get_mut(&id) {
            queue.pop_front();
            if queue.is_empty() {
                self.pending.remove(&id);
            }
        }
    }

    fn surface_error(&mut self, id: ConversationId, message: String) -> InboundOutcome {
        self.hide_typing(id);
        if id != self.store.active_id() {
            tracing::debug!(conversation_id = %id, "Ignoring error for background conversation");
            return InboundOutcome::Ignored;
        }
        self.show_annotation(id, message);
        InboundOutcome::Displayed
    }

    fn show_annotation(&mut self, id: ConversationId, message: String) {
        self.annotation = Some(ErrorAnnotation {
            conversation_id: id,
            message: message.clone(),
        });
        self.store.emit(Notification::RemoteError {
            conversation_id: id,
            message,
        });
    }

    fn hide_typing(&mut self, id: ConversationId) {
        if self.typing == Some(id) {
            self.typing = None;
            self.store.emit(Notification::Typing {
                conversation_id: id,
                visible: false,
            });
        }
    }

    fn forget_requests(&mut self, id: ConversationId) {
        self.pending.remove(&id);
        self.expired.remove(&id);
    }

    fn clear_transient(&mut self) {
        if let Some(id) = self.typing {
            self.hide_typing(id);
        }
        self.annotation = None;
    }
}
