//! In-memory conversation store
//!
//! [`ConversationStore`] owns every conversation of the session, the active
//! conversation pointer, and the display language used for placeholder
//! names. It enforces the session invariants:
//!
//! - exactly one conversation is active, and it always exists;
//! - ids are unique for the lifetime of the process;
//! - a conversation's name is derived once, from its first turn.
//!
//! Every mutating operation is followed by exactly one
//! [`Notification::StoreChanged`] to the subscribed sinks.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::chat::ids::{ConversationId, IdGenerator};
use crate::chat::log::{Author, MessageLog, Turn};
use crate::chat::naming::{derive_name, NamingConfig};
use crate::chat::notify::{
    ChangeKind, Notification, PresentationSink, StoreChange, StoreSnapshot, Subscribers,
    SubscriptionId,
};
use crate::chat::search::{self, SearchResult};
use crate::error::{PolyglotError, Result};
use crate::locale::Language;

/// One chat thread
#[derive(Debug, Clone)]
pub struct Conversation {
    id: ConversationId,
    name: Option<String>,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    /// Logical clock value of the last activity; orders the history list
    activity: u64,
    log: MessageLog,
}

impl Conversation {
    fn new(id: ConversationId, now: DateTime<Utc>, activity: u64) -> Self {
        Self {
            id,
            name: None,
            created_at: now,
            last_activity_at: now,
            activity,
            log: MessageLog::new(),
        }
    }

    /// Identifier of the conversation
    pub fn id(&self) -> ConversationId {
        self.id
    }

    /// Name derived from the first turn, if one was appended
    pub fn derived_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name to display in `language`
    ///
    /// Conversations without turns show the "new chat" label of the given
    /// language, so their label follows language switches.
    pub fn display_name(&self, language: Language) -> &str {
        self.name
            .as_deref()
            .unwrap_or(language.translations().new_chat)
    }

    /// When the conversation was created
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the conversation was created or last received a turn
    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    /// The turn log
    pub fn log(&self) -> &MessageLog {
        &self.log
    }
}

/// Row of the history list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    /// Conversation id
    pub id: ConversationId,
    /// Display name in the current language
    pub name: String,
    /// Whether this is the active conversation
    pub is_active: bool,
    /// Creation or last-turn time
    pub last_activity_at: DateTime<Utc>,
    /// Number of turns in the log
    pub turn_count: usize,
}

/// Owner of all conversations of a session
///
/// # Examples
///
/// ```
/// use polyglot_messenger::chat::log::Author;
/// use polyglot_messenger::chat::store::ConversationStore;
///
/// let mut store = ConversationStore::default();
/// let id = store.active_id();
/// store.append_turn(id, "hello there my good friend", Author::User).unwrap();
///
/// let summaries = store.list_summaries();
/// assert_eq!(summaries[0].name, "hello there my...");
/// assert!(summaries[0].is_active);
/// ```
#[derive(Debug)]
pub struct ConversationStore {
    conversations: HashMap<ConversationId, Conversation>,
    active: ConversationId,
    ids: IdGenerator,
    clock: u64,
    language: Language,
    naming: NamingConfig,
    subscribers: Subscribers,
}

impl ConversationStore {
    /// Create a store holding one empty, active conversation
    ///
    /// # Arguments
    ///
    /// * `language` - Initial display language
    /// * `naming` - Naming algorithm parameters
    pub fn new(language: Language, naming: NamingConfig) -> Self {
        let mut ids = IdGenerator::new();
        let active = ids.next_id();
        let mut conversations = HashMap::new();
        conversations.insert(active, Conversation::new(active, Utc::now(), 0));

        tracing::debug!(conversation_id = %active, "Created initial conversation");

        Self {
            conversations,
            active,
            ids,
            clock: 0,
            language,
            naming,
            subscribers: Subscribers::default(),
        }
    }

    /// Create an empty conversation and make it active
    ///
    /// # Returns
    ///
    /// The id of the new conversation
    pub fn create_conversation(&mut self) -> ConversationId {
        let id = self.insert_new();
        tracing::info!(conversation_id = %id, "Created conversation");
        self.notify(ChangeKind::Created { id });
        id
    }

    /// Make `id` the active conversation
    ///
    /// # Errors
    ///
    /// Returns [`PolyglotError::NotFound`] if `id` is unknown; the active
    /// conversation is left unchanged.
    pub fn set_active(&mut self, id: ConversationId) -> Result<()> {
        let turns = self
            .conversations
            .get(&id)
            .map(|c| c.log.as_slice().to_vec())
            .ok_or(PolyglotError::NotFound(id))?;

        self.active = id;
        tracing::debug!(conversation_id = %id, "Switched active conversation");
        self.notify(ChangeKind::ActiveChanged { id, turns });
        Ok(())
    }

    /// Remove a conversation and its turns
    ///
    /// When the removed conversation was active, a fresh empty conversation
    /// is created and made active before the notification goes out.
    ///
    /// # Errors
    ///
    /// Returns [`PolyglotError::NotFound`] if `id` is unknown.
    pub fn delete_conversation(&mut self, id: ConversationId) -> Result<()> {
        if self.conversations.remove(&id).is_none() {
            return Err(PolyglotError::NotFound(id).into());
        }

        let replacement = if id == self.active {
            Some(self.insert_new())
        } else {
            None
        };

        tracing::info!(
            conversation_id = %id,
            replacement = ?replacement.map(|r| r.to_string()),
            "Deleted conversation"
        );
        self.notify(ChangeKind::Deleted { id, replacement });
        Ok(())
    }

    /// Append a turn to conversation `id`
    ///
    /// The turn is stamped with the current time. If it is the first turn,
    /// the conversation name is derived from it. The conversation moves to
    /// the front of the history list.
    ///
    /// # Errors
    ///
    /// Returns [`PolyglotError::NotFound`] if `id` is unknown. The store never
    /// redirects the turn to another conversation.
    pub fn append_turn(
        &mut self,
        id: ConversationId,
        content: impl Into<String>,
        author: Author,
    ) -> Result<()> {
        let activity = self.tick();
        let naming = &self.naming;
        let conversation = self
            .conversations
            .get_mut(&id)
            .ok_or(PolyglotError::NotFound(id))?;

        let turn = Turn::new(content, author);
        conversation.last_activity_at = turn.timestamp();
        conversation.activity = activity;
        if conversation.log.push(turn.clone()) == 0 {
            conversation.name = Some(derive_name(&turn, naming));
        }

        tracing::debug!(
            conversation_id = %id,
            %author,
            turns = conversation.log.len(),
            "Appended turn"
        );
        self.notify(ChangeKind::TurnAppended { id, turn });
        Ok(())
    }

    /// Summaries of every conversation, most recently active first
    ///
    /// Ties on last activity are broken by id, newest first.
    pub fn list_summaries(&self) -> Vec<ConversationSummary> {
        let mut conversations: Vec<&Conversation> = self.conversations.values().collect();
        conversations.sort_by(|a, b| b.activity.cmp(&a.activity).then(b.id.cmp(&a.id)));

        conversations
            .into_iter()
            .map(|c| ConversationSummary {
                id: c.id,
                name: c.display_name(self.language).to_string(),
                is_active: c.id == self.active,
                last_activity_at: c.last_activity_at,
                turn_count: c.log.len(),
            })
            .collect()
    }

    /// Filter the history list by name
    ///
    /// See [`search::filter`].
    pub fn filter(&self, query: &str) -> SearchResult {
        search::filter(self.list_summaries(), query, self.language)
    }

    /// Change the display language
    ///
    /// Conversations without turns are displayed with the new language's
    /// "new chat" label from now on. Derived names are not touched.
    pub fn set_language(&mut self, language: Language) {
        self.language = language;
        tracing::debug!(language = %language, "Changed display language");
        self.notify(ChangeKind::LanguageChanged { language });
    }

    /// Register a sink for change notifications
    pub fn subscribe(&mut self, sink: Box<dyn PresentationSink>) -> SubscriptionId {
        self.subscribers.add(sink)
    }

    /// Remove a previously registered sink
    ///
    /// Returns `false` if the subscription was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }

    /// The active conversation id
    pub fn active_id(&self) -> ConversationId {
        self.active
    }

    /// The active conversation
    pub fn active(&self) -> &Conversation {
        // The active id always refers to a stored conversation.
        &self.conversations[&self.active]
    }

    /// Look up a conversation
    pub fn conversation(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations.get(&id)
    }

    /// Whether `id` refers to a stored conversation
    pub fn contains(&self, id: ConversationId) -> bool {
        self.conversations.contains_key(&id)
    }

    /// Number of stored conversations (never zero)
    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    /// Current display language
    pub fn language(&self) -> Language {
        self.language
    }

    /// Current snapshot of the history list
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            active: self.active,
            summaries: self.list_summaries(),
        }
    }

    /// Deliver a transient notification to the subscribed sinks
    pub(crate) fn emit(&mut self, notification: Notification) {
        self.subscribers.broadcast(&notification);
    }

    fn insert_new(&mut self) -> ConversationId {
        let id = self.ids.next_id();
        let activity = self.tick();
        self.conversations
            .insert(id, Conversation::new(id, Utc::now(), activity));
        self.active = id;
        id
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn notify(&mut self, kind: ChangeKind) {
        if self.subscribers.len() == 0 {
            return;
        }
        let change = StoreChange {
            kind,
            snapshot: self.snapshot(),
        };
        self.subscribers
            .broadcast(&Notification::StoreChanged(change));
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(Language::default(), NamingConfig::default())
    }
}
