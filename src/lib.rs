//! Polyglot Messenger - multi-conversation chat client library
//!
//! This library provides the session state behind a chat client that keeps
//! several conversations with an AI assistant, routes asynchronous assistant
//! events to the right conversation, and presents the result in one of the
//! supported display languages.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `chat`: Conversation store, message logs, naming, search and change notifications
//! - `session`: Chat session tying the store to the event protocol
//! - `protocol`: Wire events exchanged with the assistant service
//! - `transport`: Assistant service, subprocess bridge and the pumps between them and the session
//! - `locale`: Supported languages and their interface text
//! - `render`: Escaping and terminal presentation
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Escaping policy
//!
//! Turn content is untrusted, whoever wrote it, and the store keeps it raw.
//! Front-ends escape it for their medium: HTML front-ends through
//! [`render::escape_html`], terminals through [`render::sanitize_terminal`]
//! (which [`render::TerminalSink`] applies to every line it prints).
//!
//! ```
//! use polyglot_messenger::chat::log::Author;
//! use polyglot_messenger::render::escape_html;
//! use polyglot_messenger::ConversationStore;
//!
//! let mut store = ConversationStore::default();
//! let id = store.active_id();
//! store.append_turn(id, "<script>alert(1)</script>", Author::Assistant).unwrap();
//!
//! let raw = store.active().log().last().unwrap().content();
//! assert_eq!(raw, "<script>alert(1)</script>");
//! assert_eq!(escape_html(raw), "&lt;script&gt;alert(1)&lt;/script&gt;");
//! ```
//!
//! # Example
//!
//! ```
//! use polyglot_messenger::{ChatSession, ConversationStore, Language};
//!
//! let store = ConversationStore::new(Language::English, Default::default());
//! let mut session = ChatSession::new(store);
//! session.send_user_message("What is the capital of France?").unwrap();
//! assert_eq!(session.summaries()[0].name, "What is the...");
//! ```

pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod locale;
pub mod logging;
pub mod protocol;
pub mod render;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use chat::store::ConversationStore;
pub use config::Config;
pub use error::{PolyglotError, Result};
pub use locale::Language;
pub use session::ChatSession;
