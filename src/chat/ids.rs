//! Conversation identifiers
//!
//! Conversations are keyed by monotonic ULIDs. A ULID carries its creation
//! millisecond in the high bits, and the monotonic generator increments the
//! random part for ids minted within the same millisecond, so comparing two
//! ids compares their creation order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::{Generator, Ulid};

use crate::error::PolyglotError;

/// Opaque, process-unique identifier of a conversation
///
/// Ordering follows creation order. On the wire it is the 26-character
/// Crockford base32 form of the underlying ULID.
///
/// # Examples
///
/// ```
/// use polyglot_messenger::chat::ids::ConversationId;
///
/// let id: ConversationId = "01ARZ3NDEKTSV4RRFFQ69G5FAV".parse().unwrap();
/// assert_eq!(id.to_string(), "01ARZ3NDEKTSV4RRFFQ69G5FAV");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(Ulid);

impl ConversationId {
    /// Returns the underlying ULID
    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConversationId {
    type Err = PolyglotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s.trim())
            .map(Self)
            .map_err(|e| PolyglotError::MalformedEvent(format!("invalid conversation id {s:?}: {e}")))
    }
}

/// Mints strictly increasing [`ConversationId`]s
///
/// Owned by the conversation store; creation is serialized through it.
pub struct IdGenerator {
    inner: Generator,
    last: Option<Ulid>,
}

impl IdGenerator {
    /// Create a new generator
    pub fn new() -> Self {
        Self {
            inner: Generator::new(),
            last: None,
        }
    }

    /// Produce the next id
    ///
    /// Ids are strictly greater than every id previously returned by this
    /// generator.
    pub fn next_id(&mut self) -> ConversationId {
        let candidate = match self.inner.generate() {
            Ok(ulid) => ulid,
            Err(e) => {
                // Random-part overflow within one millisecond.
                tracing::warn!("ULID generator overflow ({e}); falling back to successor id");
                self.last
                    .and_then(|last| last.increment())
                    .unwrap_or_else(Ulid::new)
            }
        };

        // Guard against the wall clock stepping backwards between calls.
        let ulid = match self.last {
            Some(last) if candidate <= last => last.increment().unwrap_or(candidate),
            _ => candidate,
        };

        self.last = Some(ulid);
        ConversationId(ulid)
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator")
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
