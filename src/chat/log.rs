//! Append-only message log
//!
//! Each conversation owns a [`MessageLog`]. Turns are pushed in
//! chronological order and are never edited or removed individually; the
//! log disappears only with its conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who wrote a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    /// The local user
    User,
    /// The remote assistant
    Assistant,
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message exchanged within a conversation
///
/// Content is stored exactly as received. It is untrusted text; renderers
/// apply the escaping policy in [`crate::render`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    content: String,
    author: Author,
    timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a turn stamped with the current time
    ///
    /// # Examples
    ///
    /// ```
    /// use polyglot_messenger::chat::log::{Author, Turn};
    ///
    /// let turn = Turn::new("hello", Author::User);
    /// assert_eq!(turn.content(), "hello");
    /// assert_eq!(turn.author(), Author::User);
    /// ```
    pub fn new(content: impl Into<String>, author: Author) -> Self {
        Self::at(content, author, Utc::now())
    }

    /// Create a turn with an explicit timestamp
    pub fn at(content: impl Into<String>, author: Author, timestamp: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            author,
            timestamp,
        }
    }

    /// Raw text of the turn
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Author of the turn
    pub fn author(&self) -> Author {
        self.author
    }

    /// When the turn was created
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Ordered, append-only sequence of turns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageLog {
    turns: Vec<Turn>,
}

impl MessageLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn at the end of the log
    ///
    /// Returns the position of the new turn (0 for the first turn).
    pub fn push(&mut self, turn: Turn) -> usize {
        self.turns.push(turn);
        self.turns.len() - 1
    }

    /// The first turn, which determines the conversation name
    pub fn first(&self) -> Option<&Turn> {
        self.turns.first()
    }

    /// The most recent turn
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Number of turns
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// True when no turn has been appended yet
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Iterate turns in chronological order
    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    /// All turns as a slice
    pub fn as_slice(&self) -> &[Turn] {
        &self.turns
    }
}

impl<'a> IntoIterator for &'a MessageLog {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_preserves_insertion_order() {
        let mut log = MessageLog::new();
        assert_eq!(log.push(Turn::new("one", Author::User)), 0);
        assert_eq!(log.push(Turn::new("two", Author::Assistant)), 1);
        assert_eq!(log.push(Turn::new("three", Author::User)), 2);

        let contents: Vec<&str> = log.iter().map(Turn::content).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(log.first().map(Turn::content), Some("one"));
        assert_eq!(log.last().map(Turn::content), Some("three"));
    }

    #[test]
    fn test_empty_log() {
        let log = MessageLog::new();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
        assert!(log.first().is_none());
    }

    #[test]
    fn test_author_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Author::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Author::Assistant).unwrap(),
            "\"assistant\""
        );
    }
}
