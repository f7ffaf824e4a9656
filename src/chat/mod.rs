//! Conversation state
//!
//! Everything that describes the conversations of a session lives here:
//! identifiers, turn logs, naming, the store that owns them, the
//! notifications it emits, and search over its history list.

pub mod ids;
pub mod log;
pub mod naming;
pub mod notify;
pub mod search;
pub mod store;

pub use ids::ConversationId;
pub use log::{Author, MessageLog, Turn};
pub use notify::{ChangeKind, Notification, PresentationSink, StoreChange, StoreSnapshot};
pub use search::SearchResult;
pub use store::{Conversation, ConversationStore, ConversationSummary};
