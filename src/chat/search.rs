//! Search over the conversation history list

use crate::chat::store::ConversationSummary;
use crate::locale::Language;

/// Outcome of a history search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResult {
    /// Conversations whose display name matched, in history order
    Matches(Vec<ConversationSummary>),
    /// Nothing matched; `label` is the localized "no results" text
    NoMatches { label: String },
}

impl SearchResult {
    /// Matching summaries, empty for [`SearchResult::NoMatches`]
    pub fn matches(&self) -> &[ConversationSummary] {
        match self {
            Self::Matches(summaries) => summaries,
            Self::NoMatches { .. } => &[],
        }
    }
}

/// Filter summaries by a case-insensitive substring of their display name
///
/// Only an empty query returns every summary unchanged; any other query,
/// whitespace included, is matched as given. Order is preserved. When nothing matches, the result carries the "no
/// results" label of `language` instead of an empty list.
///
/// # Examples
///
/// ```
/// use polyglot_messenger::chat::search::{filter, SearchResult};
/// use polyglot_messenger::chat::store::ConversationStore;
/// use polyglot_messenger::locale::Language;
///
/// let store = ConversationStore::default();
/// let result = filter(store.list_summaries(), "zebra", Language::English);
/// assert_eq!(
///     result,
///     SearchResult::NoMatches { label: "No messages found".to_string() }
/// );
/// ```
pub fn filter(
    summaries: Vec<ConversationSummary>,
    query: &str,
    language: Language,
) -> SearchResult {
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return SearchResult::Matches(summaries);
    }

    let matches: Vec<_> = summaries
        .into_iter()
        .filter(|s| s.name.to_lowercase().contains(&needle))
        .collect();

    if matches.is_empty() {
        SearchResult::NoMatches {
            label: language.translations().no_results.to_string(),
        }
    } else {
        SearchResult::Matches(matches)
    }
}
