// src/core/types.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A lexical token produced by the tokenizer. Equality is exact string equality.
pub type Token = String;

/// Identifier of a language group, e.g. `".py"`.
pub type LanguageGroup = String;

/// Identity of an open document, typically its URI or path.
pub type DocumentId = String;

/// Next-token distribution for a single context: token -> occurrence count.
/// Counts are always >= 1; zero entries are removed, never stored.
pub type TokenCounts = BTreeMap<Token, u64>;

/// Which table produced a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Static,
    Session,
}

/// A ranked next-token candidate.
///
/// `confidence` is a relative estimate in `[0, 1]`; it is not calibrated
/// across sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub token: Token,
    pub confidence: f64,
    pub source: Source,
}

impl Suggestion {
    pub fn new(token: impl Into<Token>, confidence: f64, source: Source) -> Self {
        Self {
            token: token.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source,
        }
    }
}

/// Normalizes a file extension into a language group id: lower-case, leading dot.
pub fn language_group_for_extension(extension: &str) -> LanguageGroup {
    let trimmed = extension.trim();
    let lowered = trimmed.to_ascii_lowercase();
    if lowered.starts_with('.') {
        lowered
    } else {
        format!(".{lowered}")
    }
}
