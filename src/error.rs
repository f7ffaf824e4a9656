//! Error types for Polyglot Messenger
//!
//! This module defines all error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

use crate::chat::ids::ConversationId;

/// Main error type for Polyglot Messenger operations
///
/// Covers caller errors against the conversation store, failures reported
/// by the remote assistant, malformed protocol traffic, transport faults,
/// and configuration problems.
#[derive(Error, Debug)]
pub enum PolyglotError {
    /// A conversation id that does not exist in the store was referenced
    ///
    /// This is a caller error: the store never redirects an operation to a
    /// different conversation.
    #[error("Conversation not found: {0}")]
    NotFound(ConversationId),

    /// The remote assistant reported an error for a request
    #[error("Remote error: {0}")]
    Remote(String),

    /// An inbound protocol message could not be decoded or lacked required fields
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// The bidirectional channel to the assistant failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// A language code with no translation table
    #[error("Unknown language: {0}")]
    UnknownLanguage(String),

    /// An interactive command could not be executed
    #[error("Command error: {0}")]
    Command(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Polyglot Messenger operations
///
/// Uses `anyhow::Error` so that context can be attached while propagating.
/// The typed [`PolyglotError`] is recovered with `downcast_ref`.
pub type Result<T> = anyhow::Result<T>;
