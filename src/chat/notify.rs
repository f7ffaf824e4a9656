//! Change notifications and the presentation sink interface
//!
//! The store and the session never render anything. After every mutation
//! they push a [`Notification`] to each subscribed [`PresentationSink`],
//! which re-renders from the payload alone.

use std::fmt;

use crate::chat::ids::ConversationId;
use crate::chat::log::Turn;
use crate::chat::store::ConversationSummary;
use crate::locale::Language;

/// Full view of the history list after a mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSnapshot {
    /// The active conversation
    pub active: ConversationId,
    /// Every conversation, most recently active first
    pub summaries: Vec<ConversationSummary>,
}

/// Which mutation produced a [`StoreChange`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// A conversation was created and made active
    Created { id: ConversationId },
    /// The active pointer moved; `turns` is the newly active log
    ActiveChanged { id: ConversationId, turns: Vec<Turn> },
    /// A conversation was removed; `replacement` is set when the deleted
    /// conversation was active and a new one took its place
    Deleted {
        id: ConversationId,
        replacement: Option<ConversationId>,
    },
    /// A turn was appended to `id`
    TurnAppended { id: ConversationId, turn: Turn },
    /// The display language changed
    LanguageChanged { language: Language },
}

/// Payload of a store change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    /// What happened
    pub kind: ChangeKind,
    /// State of the store afterwards
    pub snapshot: StoreSnapshot,
}

/// Everything a presentation sink may be told
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The conversation store changed
    StoreChanged(StoreChange),
    /// The typing indicator for the displayed conversation appeared or went away
    Typing {
        conversation_id: ConversationId,
        visible: bool,
    },
    /// An inline, non-persistent error annotation for the displayed conversation
    RemoteError {
        conversation_id: ConversationId,
        message: String,
    },
}

/// Consumer of notifications, typically a renderer
///
/// Closures taking `&Notification` implement this trait, which keeps test
/// sinks short.
///
/// # Examples
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use polyglot_messenger::chat::notify::Notification;
/// use polyglot_messenger::chat::store::ConversationStore;
///
/// let seen = Arc::new(Mutex::new(0usize));
/// let counter = Arc::clone(&seen);
///
/// let mut store = ConversationStore::default();
/// store.subscribe(Box::new(move |_: &Notification| {
///     *counter.lock().unwrap() += 1;
/// }));
/// store.create_conversation();
/// assert_eq!(*seen.lock().unwrap(), 1);
/// ```
pub trait PresentationSink: Send {
    /// Handle one notification
    fn notify(&mut self, notification: &Notification);
}

impl<F> PresentationSink for F
where
    F: FnMut(&Notification) + Send,
{
    fn notify(&mut self, notification: &Notification) {
        self(notification)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Registered sinks, notified in subscription order
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: u64,
    sinks: Vec<(SubscriptionId, Box<dyn PresentationSink>)>,
}

impl Subscribers {
    pub(crate) fn add(&mut self, sink: Box<dyn PresentationSink>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.sinks.push((id, sink));
        id
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.sinks.len();
        self.sinks.retain(|(sid, _)| *sid != id);
        self.sinks.len() != before
    }

    pub(crate) fn broadcast(&mut self, notification: &Notification) {
        for (_, sink) in self.sinks.iter_mut() {
            sink.notify(notification);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.sinks.len()
    }
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.sinks.len())
            .finish_non_exhaustive()
    }
}
