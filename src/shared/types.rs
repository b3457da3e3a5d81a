use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Maximum accepted input length, in UTF-16 code units
pub const MAX_LENGTH: usize = 5000;

/// Default number of history entries kept before the oldest is evicted
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Length used for the input limit and the presentation counter.
///
/// Counted in UTF-16 code units, so characters outside the BMP (emoji,
/// CJK extension kanji) count twice.
pub fn character_count(text: &str) -> usize {
    text.encode_utf16().count()
}

pub fn exceeds_max_length(text: &str) -> bool {
    character_count(text) > MAX_LENGTH
}

/// The closed two-language set the translator works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "translator.ts")]
pub enum Language {
    En,
    Ja,
}

impl Language {
    /// The other member of the pair
    pub fn complement(self) -> Self {
        match self {
            Language::En => Language::Ja,
            Language::Ja => Language::En,
        }
    }

    /// ISO 639-1 code as sent on the wire
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ja => "ja",
        }
    }

    /// Parse a 639-1 or 639-3 code ("en", "eng", "ja", "jpn").
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim().to_ascii_lowercase();
        let lang = isolang::Language::from_639_1(&code)
            .or_else(|| isolang::Language::from_639_3(&code))?;
        match lang {
            isolang::Language::Eng => Some(Language::En),
            isolang::Language::Jpn => Some(Language::Ja),
            _ => None,
        }
    }

    /// Romanized readings are only produced when translating from this language.
    pub fn requires_romanization(self) -> bool {
        self == Language::Ja
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Ja => "日本語",
        }
    }

    pub fn placeholder(self) -> &'static str {
        match self {
            Language::En => "Enter text to translate...",
            Language::Ja => "テキストを入力してください...",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A successful gateway payload; also the displayed result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "translator.ts")]
pub struct Translation {
    pub translated_text: String,
    pub romanization: Option<String>,
}

/// One persisted successful translation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "translator.ts")]
pub struct TranslationEntry {
    pub id: String,
    pub source_text: String,
    pub translated_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub romanization: Option<String>,
    pub source_language: Language,
    pub target_language: Language,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[ts(type = "number")]
    pub timestamp: DateTime<Utc>,
}

// Entry text is user content; keep it out of logs
impl std::fmt::Debug for TranslationEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationEntry")
            .field("id", &self.id)
            .field("source_text", &format!("[REDACTED {} chars]", character_count(&self.source_text)))
            .field("translated_text", &format!("[REDACTED {} chars]", character_count(&self.translated_text)))
            .field("romanization", &self.romanization.as_ref().map(|_| "[REDACTED]"))
            .field("source_language", &self.source_language)
            .field("target_language", &self.target_language)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl TranslationEntry {
    /// Create a fresh entry stamped with a new id and the current time,
    /// at the millisecond precision it is stored with.
    ///
    /// Romanization is dropped unless the source language calls for it.
    pub fn new(
        source_text: impl Into<String>,
        translation: Translation,
        source_language: Language,
        target_language: Language,
    ) -> Self {
        let romanization = if source_language.requires_romanization() {
            translation.romanization
        } else {
            None
        };

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_text: source_text.into(),
            translated_text: translation.translated_text,
            romanization,
            source_language,
            target_language,
            timestamp: Utc::now().trunc_subsecs(3),
        }
    }

    pub fn translation(&self) -> Translation {
        Translation {
            translated_text: self.translated_text.clone(),
            romanization: self.romanization.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "translator.ts")]
pub enum SessionStatus {
    Idle,
    Pending,
    Succeeded,
    Failed,
    Offline,
}

/// Identity of one issued request. Only the current token may update state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestToken(pub u64);

/// Ephemeral state of one translation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "translator.ts")]
pub struct SessionState {
    pub input_text: String,
    pub source_language: Language,
    pub target_language: Language,
    pub status: SessionStatus,
    #[ts(type = "number | null")]
    pub active_request: Option<RequestToken>,
    pub last_result: Option<Translation>,
    pub last_error: Option<String>,
    /// Set when a history write failed; independent of translation status
    pub storage_error: Option<String>,
}

impl SessionState {
    pub fn new(source_language: Language) -> Self {
        Self {
            input_text: String::new(),
            source_language,
            target_language: source_language.complement(),
            status: SessionStatus::Idle,
            active_request: None,
            last_result: None,
            last_error: None,
            storage_error: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == SessionStatus::Pending
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(Language::En)
    }
}

/// What the presentation layer renders: session state plus history, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "translator.ts")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub history: Vec<TranslationEntry>,
}
