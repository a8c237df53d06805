// File: src/session.rs
use crate::core::context::{ngram_windows, ContextKey};
use crate::core::scoring::{score, ScoringParams};
use crate::core::table::{FrequencyTable, NgramSource};
use crate::core::tokenizer::Tokenizer;
use crate::core::types::{DocumentId, LanguageGroup, Source, Suggestion, Token};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub const DEFAULT_SESSION_DAMPENING: f64 = 0.9;

/// Token stream of one open document, kept so the table can be rebuilt when
/// a document goes away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedDocument {
    pub group: LanguageGroup,
    pub tokens: Vec<Token>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub documents: usize,
    pub groups: usize,
}

/// Frequency table built only from the documents currently open.
///
/// Mutated in place by document events. Callers must not read and write it
/// concurrently; a multi-threaded host has to put it behind a mutex.
#[derive(Debug, Clone)]
pub struct SessionIndex {
    n: usize,
    dampening: f64,
    table: FrequencyTable,
    documents: BTreeMap<DocumentId, CachedDocument>,
}

impl SessionIndex {
    /// Creates an empty index for a model of order `n`.
    pub fn new(n: usize) -> Self {
        Self {
            n,
            dampening: DEFAULT_SESSION_DAMPENING,
            table: FrequencyTable::new(),
            documents: BTreeMap::new(),
        }
    }

    pub fn with_dampening(mut self, dampening: f64) -> Self {
        self.dampening = dampening;
        self
    }

    fn width(&self) -> usize {
        self.n.saturating_sub(1)
    }

    /// Tokenizes `text` and adds all of its n-grams. Inserting an id that is
    /// already indexed replaces its previous contribution.
    pub fn insert(&mut self, id: &str, group: &str, text: &str) {
        let tokens = Tokenizer::for_group(group).tokenize(text);
        self.insert_tokens(id, group, tokens);
    }

    pub fn insert_tokens(&mut self, id: &str, group: &str, tokens: Vec<Token>) {
        if self.documents.contains_key(id) {
            self.remove(id);
        }
        let document = CachedDocument { group: group.to_string(), tokens };
        self.index_document(&document);
        debug!(document = id, group, tokens = document.tokens.len(), "indexed document");
        self.documents.insert(id.to_string(), document);
    }

    /// Drops a document and rebuilds the table from the remaining ones.
    /// Returns `false` when the id was not indexed.
    pub fn remove(&mut self, id: &str) -> bool {
        if self.documents.remove(id).is_none() {
            return false;
        }
        self.rebuild();
        debug!(document = id, remaining = self.documents.len(), "removed document");
        true
    }

    pub fn update(&mut self, id: &str, group: &str, text: &str) {
        self.remove(id);
        self.insert(id, group, text);
    }

    /// Exact-match suggestions from open documents, dampened and tagged `session`.
    pub fn suggest(
        &self,
        tokens: &[Token],
        groups: &[LanguageGroup],
        max_results: usize,
        min_confidence: f64,
    ) -> Vec<Suggestion> {
        let params = ScoringParams::exact_only(max_results, min_confidence);
        let mut suggestions = score(self, Source::Session, tokens, groups, &params);
        for suggestion in &mut suggestions {
            suggestion.confidence *= self.dampening;
        }
        suggestions
    }

    pub fn stats(&self) -> SessionStats {
        let groups: BTreeSet<&LanguageGroup> = self.documents.values().map(|d| &d.group).collect();
        SessionStats {
            documents: self.documents.len(),
            groups: groups.len(),
        }
    }

    pub fn clear(&mut self) {
        self.table.clear();
        self.documents.clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }

    pub fn documents(&self) -> impl Iterator<Item = (&DocumentId, &CachedDocument)> {
        self.documents.iter()
    }

    /// Re-indexes every cached document for a model of order `n`.
    pub fn reindex(&mut self, n: usize) {
        if n == self.n {
            return;
        }
        self.n = n;
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.table.clear();
        let documents = std::mem::take(&mut self.documents);
        for document in documents.values() {
            self.index_document(document);
        }
        self.documents = documents;
    }

    fn index_document(&mut self, document: &CachedDocument) {
        let width = self.width();
        if width == 0 || document.tokens.len() <= width {
            return;
        }
        let group = self.table.group_mut(&document.group);
        for (context, next) in ngram_windows(&document.tokens, width) {
            group.increment(ContextKey::from_slice(context), next, 1);
        }
    }
}

impl NgramSource for SessionIndex {
    fn order(&self) -> usize {
        self.n
    }

    fn table(&self) -> &FrequencyTable {
        &self.table
    }
}
