// File: src/core/context.rs
use crate::core::types::Token;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered window of the most recent tokens, used as a table key.
///
/// Equality, hashing and ordering are structural over the token sequence, so
/// two keys are equal iff their tokens are equal element-wise and in order.
/// The external form (`encode`/`decode`) is a JSON array of strings, which
/// escapes quotes and separators and therefore never conflates two
/// distinct sequences.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextKey(Box<[Token]>);

impl ContextKey {
    pub fn new(tokens: impl Into<Box<[Token]>>) -> Self {
        Self(tokens.into())
    }

    pub fn from_slice(tokens: &[Token]) -> Self {
        Self(tokens.to_vec().into_boxed_slice())
    }

    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical external encoding: `["foo","("]`.
    pub fn encode(&self) -> String {
        // Serializing a slice of strings cannot fail.
        serde_json::to_string(&self.0).unwrap_or_default()
    }

    /// Parses any JSON array of strings, regardless of whitespace or `\u`
    /// escapes, into a key. Returns `None` for anything else.
    pub fn decode(encoded: &str) -> Option<Self> {
        serde_json::from_str::<Vec<Token>>(encoded).ok().map(Self::new)
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Returns the lookup context for a model of order `n`: the last `n - 1`
/// tokens, or `None` when fewer are available.
pub fn extract_context(tokens: &[Token], n: usize) -> Option<ContextKey> {
    let width = n.checked_sub(1)?;
    if width == 0 || tokens.len() < width {
        return None;
    }
    Some(ContextKey::from_slice(&tokens[tokens.len() - width..]))
}

/// Slides a window of `width` tokens over `tokens`, yielding every
/// `(context, next_token)` pair.
pub fn ngram_windows(tokens: &[Token], width: usize) -> impl Iterator<Item = (&[Token], &Token)> {
    let span = if width == 0 { tokens.len() + 1 } else { width + 1 };
    tokens
        .windows(span)
        .map(move |window| (&window[..width], &window[width]))
}
