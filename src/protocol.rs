//! Wire protocol between the chat client and the assistant service
//!
//! Every message is a single JSON object, encoded without newlines, whose
//! `event` field names its kind. The client sends `send_message`; the
//! service answers with any number of `ai_typing` events followed by one
//! `ai_response` or `ai_error` for the same `conversationId`.
//!
//! ```text
//! -> {"event":"send_message","message":"hi","conversationId":"01H..","timestamp":"2024-..Z"}
//! <- {"event":"ai_typing","conversationId":"01H.."}
//! <- {"event":"ai_response","conversationId":"01H..","message":"Hello!","timestamp":"2024-..Z"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::ids::ConversationId;
use crate::error::PolyglotError;

/// Event name of a user request
pub const SEND_MESSAGE: &str = "send_message";
/// Event name of a typing notice
pub const AI_TYPING: &str = "ai_typing";
/// Event name of an assistant reply
pub const AI_RESPONSE: &str = "ai_response";
/// Event name of a failed request
pub const AI_ERROR: &str = "ai_error";

const INBOUND_EVENTS: [&str; 3] = [AI_TYPING, AI_RESPONSE, AI_ERROR];

/// Message sent from the client to the assistant service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum OutboundRequest {
    /// A user turn to answer
    #[serde(rename = "send_message", rename_all = "camelCase")]
    SendMessage {
        /// Text of the user turn
        message: String,
        /// Conversation the turn belongs to
        conversation_id: ConversationId,
        /// When the turn was created
        timestamp: DateTime<Utc>,
    },
}

impl OutboundRequest {
    /// Conversation the request belongs to
    pub fn conversation_id(&self) -> ConversationId {
        match self {
            Self::SendMessage {
                conversation_id, ..
            } => *conversation_id,
        }
    }

    /// Encode as a single-line JSON string
    pub fn to_json(&self) -> Result<String, PolyglotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a request received by a service
    ///
    /// # Errors
    ///
    /// Returns [`PolyglotError::MalformedEvent`] when `raw` is not a valid
    /// `send_message` object.
    pub fn from_json(raw: &str) -> Result<Self, PolyglotError> {
        serde_json::from_str(raw).map_err(|e| PolyglotError::MalformedEvent(e.to_string()))
    }
}

/// Message sent from the assistant service to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum InboundEvent {
    /// The assistant started working on a reply
    #[serde(rename = "ai_typing", rename_all = "camelCase")]
    Typing {
        /// Conversation being answered
        conversation_id: ConversationId,
    },

    /// The assistant's reply
    #[serde(rename = "ai_response", rename_all = "camelCase")]
    Response {
        /// Conversation being answered
        conversation_id: ConversationId,
        /// Reply text
        message: String,
        /// Timestamp echoed from the request, if the service sends one
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },

    /// The request failed
    #[serde(rename = "ai_error", rename_all = "camelCase")]
    Error {
        /// Conversation the failed request belonged to
        conversation_id: ConversationId,
        /// Human-readable error text
        error: String,
    },
}

impl InboundEvent {
    /// Conversation the event refers to
    pub fn conversation_id(&self) -> ConversationId {
        match self {
            Self::Typing { conversation_id }
            | Self::Response {
                conversation_id, ..
            }
            | Self::Error {
                conversation_id, ..
            } => *conversation_id,
        }
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::Typing { .. } => AI_TYPING,
            Self::Response { .. } => AI_RESPONSE,
            Self::Error { .. } => AI_ERROR,
        }
    }

    /// Encode as a single-line JSON string
    pub fn to_json(&self) -> Result<String, PolyglotError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decode one inbound message
///
/// The message is checked step by step so that the error names what is
/// wrong with it: invalid JSON, a missing or unknown `event`, a missing
/// `conversationId`, or a bad payload.
///
/// # Errors
///
/// Returns [`PolyglotError::MalformedEvent`] describing the first problem.
///
/// # Examples
///
/// ```
/// use polyglot_messenger::protocol::{parse_inbound, InboundEvent};
///
/// let raw = r#"{"event":"ai_typing","conversationId":"01ARZ3NDEKTSV4RRFFQ69G5FAV"}"#;
/// let event = parse_inbound(raw).unwrap();
/// assert!(matches!(event, InboundEvent::Typing { .. }));
///
/// assert!(parse_inbound(r#"{"event":"ai_typing"}"#).is_err());
/// ```
pub fn parse_inbound(raw: &str) -> Result<InboundEvent, PolyglotError> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| PolyglotError::MalformedEvent(format!("invalid JSON: {e}")))?;

    if !value.is_object() {
        return Err(PolyglotError::MalformedEvent(
            "expected a JSON object".to_string(),
        ));
    }

    let event = value
        .get("event")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .ok_or_else(|| PolyglotError::MalformedEvent("missing event field".to_string()))?;

    if !INBOUND_EVENTS.contains(&event.as_str()) {
        return Err(PolyglotError::MalformedEvent(format!(
            "unknown event '{event}'"
        )));
    }

    if value.get("conversationId").map_or(true, |v| v.is_null()) {
        return Err(PolyglotError::MalformedEvent(format!(
            "{event} without conversationId"
        )));
    }

    serde_json::from_value(value)
        .map_err(|e| PolyglotError::MalformedEvent(format!("invalid {event} payload: {e}")))
}
