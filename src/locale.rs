//! Localized interface strings
//!
//! The chat core only needs two strings from here: the "new chat" label
//! used as the name of conversations without turns, and the "no results"
//! label reported by search. The front-end uses the rest.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PolyglotError;

/// String table for one display language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translations {
    /// Label of a conversation that has no turns yet, and of the new-chat action
    pub new_chat: &'static str,
    /// Heading of the conversation history list
    pub history: &'static str,
    /// Application title
    pub assistant: &'static str,
    /// Prompt shown for the search command
    pub search_placeholder: &'static str,
    /// Prompt shown for message input
    pub message_placeholder: &'static str,
    /// Label of the send action
    pub send: &'static str,
    /// Shown when a search matches nothing
    pub no_results: &'static str,
    /// Annotation synthesized when a request times out
    pub request_timed_out: &'static str,
}

const ENGLISH: Translations = Translations {
    new_chat: "New Chat",
    history: "AMIK History",
    assistant: "AMIK AI ASSISTANT",
    search_placeholder: "Search messages...",
    message_placeholder: "Type a message...",
    send: "Send",
    no_results: "No messages found",
    request_timed_out: "The assistant did not respond in time.",
};

const CHINESE: Translations = Translations {
    new_chat: "新对话",
    history: "艾米克历史",
    assistant: "艾米克人工智能助手",
    search_placeholder: "搜索消息...",
    message_placeholder: "输入消息...",
    send: "发送",
    no_results: "未找到消息",
    request_timed_out: "助手未能及时响应。",
};

const URDU: Translations = Translations {
    new_chat: "نئی چیٹ",
    history: "اے ایم آئی کے ہسٹری",
    assistant: "اے ایم آئی کے مصنوعی ذہانت اسسٹنٹ",
    search_placeholder: "پیغامات تلاش کریں...",
    message_placeholder: "پیغام ٹائپ کریں...",
    send: "بھیجیں",
    no_results: "کوئی پیغام نہیں ملا",
    request_timed_out: "اسسٹنٹ نے وقت پر جواب نہیں دیا۔",
};

/// Supported display languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    /// English (`en`)
    #[default]
    #[serde(rename = "en")]
    English,
    /// Simplified Chinese (`zh`)
    #[serde(rename = "zh")]
    Chinese,
    /// Urdu (`ur`)
    #[serde(rename = "ur")]
    Urdu,
}

impl Language {
    /// Every supported language, in menu order
    pub const ALL: [Language; 3] = [Language::English, Language::Chinese, Language::Urdu];

    /// Parse a language from its code
    ///
    /// Codes are matched case-insensitively; surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PolyglotError::UnknownLanguage`] for unsupported codes.
    ///
    /// # Examples
    ///
    /// ```
    /// use polyglot_messenger::locale::Language;
    ///
    /// assert_eq!(Language::from_code("ZH").unwrap(), Language::Chinese);
    /// assert!(Language::from_code("fr").is_err());
    /// ```
    pub fn from_code(code: &str) -> Result<Self, PolyglotError> {
        match code.trim().to_lowercase().as_str() {
            "en" => Ok(Self::English),
            "zh" => Ok(Self::Chinese),
            "ur" => Ok(Self::Urdu),
            other => Err(PolyglotError::UnknownLanguage(other.to_string())),
        }
    }

    /// The two-letter code of this language
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Chinese => "zh",
            Self::Urdu => "ur",
        }
    }

    /// Name of the language in the language itself
    pub fn native_name(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Chinese => "中文",
            Self::Urdu => "اردو",
        }
    }

    /// The string table for this language
    pub fn translations(&self) -> &'static Translations {
        match self {
            Self::English => &ENGLISH,
            Self::Chinese => &CHINESE,
            Self::Urdu => &URDU,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Language {
    type Err = PolyglotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s)
    }
}
