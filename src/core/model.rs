// src/core/model.rs
use crate::core::table::{FrequencyTable, NgramSource};
use crate::core::types::{LanguageGroup, Token, TokenCounts};
use crate::error::ModelError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub const DEFAULT_ALPHA: f64 = 1.0;

/// Smoothing applied when exact evidence is insufficient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum Smoothing {
    #[default]
    None,
    /// Laplace-style: every count is raised by `alpha` before normalizing.
    Additive { alpha: f64 },
}

impl Smoothing {
    pub fn additive(alpha: f64) -> Result<Self, ModelError> {
        if alpha.is_finite() && alpha > 0.0 {
            Ok(Smoothing::Additive { alpha })
        } else {
            Err(ModelError::InvalidAlpha(alpha))
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Smoothing::Additive { .. })
    }
}

/// Descriptive fields carried alongside the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    pub version: String,
    pub n: usize,
    pub file_extensions: Vec<String>,
    pub total_patterns: u64,
    pub smoothing: Smoothing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStats {
    pub version: String,
    pub n: usize,
    pub groups: Vec<LanguageGroup>,
    pub contexts: usize,
    pub total_patterns: u64,
}

/// The corpus-trained table. Immutable once built; a reload replaces it whole.
#[derive(Debug, Clone)]
pub struct StaticModel {
    meta: ModelMeta,
    table: FrequencyTable,
    vocab: BTreeMap<LanguageGroup, Vec<Token>>,
    global: BTreeMap<LanguageGroup, TokenCounts>,
}

impl StaticModel {
    pub fn new(
        meta: ModelMeta,
        table: FrequencyTable,
        vocab: BTreeMap<LanguageGroup, Vec<Token>>,
    ) -> Result<Self, ModelError> {
        if meta.n < 2 {
            return Err(ModelError::InvalidOrder(meta.n));
        }
        if let Smoothing::Additive { alpha } = meta.smoothing {
            Smoothing::additive(alpha)?;
        }

        let vocab = vocab
            .into_iter()
            .filter(|(_, tokens)| !tokens.is_empty())
            .map(|(group, tokens)| (group, dedup_preserving_order(tokens)))
            .collect();

        let global = table
            .groups()
            .map(|(group, contexts)| (group.clone(), contexts.global_frequencies()))
            .collect();

        Ok(Self { meta, table, vocab, global })
    }

    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    pub fn vocabularies(&self) -> &BTreeMap<LanguageGroup, Vec<Token>> {
        &self.vocab
    }

    pub fn stats(&self) -> ModelStats {
        ModelStats {
            version: self.meta.version.clone(),
            n: self.meta.n,
            groups: self.table.group_names().cloned().collect(),
            contexts: self.table.context_count(),
            total_patterns: self.meta.total_patterns,
        }
    }
}

impl NgramSource for StaticModel {
    fn order(&self) -> usize {
        self.meta.n
    }

    fn table(&self) -> &FrequencyTable {
        &self.table
    }

    fn vocabulary(&self, group: &str) -> Option<&[Token]> {
        self.vocab.get(group).map(Vec::as_slice)
    }

    fn global_frequencies(&self, group: &str) -> Option<&TokenCounts> {
        self.global.get(group)
    }

    fn smoothing(&self) -> Smoothing {
        self.meta.smoothing
    }
}

fn dedup_preserving_order(tokens: Vec<Token>) -> Vec<Token> {
    let mut seen = BTreeSet::new();
    tokens.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

/// Holds the current static model. Readers take an `Arc` snapshot, so a
/// concurrent `replace` is observed either entirely or not at all.
#[derive(Debug, Default)]
pub struct ModelStore {
    current: RwLock<Option<Arc<StaticModel>>>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<Arc<StaticModel>> {
        self.current.read().clone()
    }

    /// Swaps in a new model and returns the previous one.
    pub fn replace(&self, model: StaticModel) -> Option<Arc<StaticModel>> {
        self.current.write().replace(Arc::new(model))
    }

    pub fn unload(&self) -> Option<Arc<StaticModel>> {
        self.current.write().take()
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }
}
