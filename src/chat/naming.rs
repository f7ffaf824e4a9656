//! Conversation naming
//!
//! A conversation is named after the leading words of its first turn. The
//! name is derived once, when that turn is appended, and kept afterwards.

use serde::{Deserialize, Serialize};

use crate::chat::log::Turn;

/// Parameters of the naming algorithm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Number of leading words kept from the first turn
    #[serde(default = "default_max_words")]
    pub max_words: usize,

    /// Marker appended when the first turn was truncated
    #[serde(default = "default_ellipsis")]
    pub ellipsis: String,
}

fn default_max_words() -> usize {
    3
}

fn default_ellipsis() -> String {
    "...".to_string()
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            max_words: default_max_words(),
            ellipsis: default_ellipsis(),
        }
    }
}

/// Derive a conversation name from its first turn
///
/// Splits the content on whitespace, keeps the first `max_words` tokens and
/// joins them with single spaces. When the joined text is strictly shorter
/// (in characters) than the full content, the ellipsis marker is appended.
///
/// # Examples
///
/// ```
/// use polyglot_messenger::chat::log::{Author, Turn};
/// use polyglot_messenger::chat::naming::{derive_name, NamingConfig};
///
/// let config = NamingConfig::default();
///
/// let short = Turn::new("hello there friend", Author::User);
/// assert_eq!(derive_name(&short, &config), "hello there friend");
///
/// let long = Turn::new("hello there my good friend", Author::User);
/// assert_eq!(derive_name(&long, &config), "hello there my...");
/// ```
pub fn derive_name(first: &Turn, config: &NamingConfig) -> String {
    let content = first.content();
    let joined = content
        .split_whitespace()
        .take(config.max_words)
        .collect::<Vec<_>>()
        .join(" ");

    if joined.chars().count() < content.chars().count() {
        format!("{}{}", joined, config.ellipsis)
    } else {
        joined
    }
}
