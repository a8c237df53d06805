// --- File: src/core/table.rs
use crate::core::context::ContextKey;
use crate::core::model::Smoothing;
use crate::core::types::{LanguageGroup, Token, TokenCounts};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Contexts of one language group and their next-token distributions.
///
/// Ordered maps keep iteration (and so fuzzy scanning under a budget)
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTable {
    contexts: BTreeMap<ContextKey, TokenCounts>,
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, context: &ContextKey) -> Option<&TokenCounts> {
        self.contexts.get(context)
    }

    /// Adds `count` occurrences of `next` after `context`. A zero count is a no-op.
    pub fn increment(&mut self, context: ContextKey, next: &str, count: u64) {
        if count == 0 {
            return;
        }
        let counts = self.contexts.entry(context).or_default();
        match counts.get_mut(next) {
            Some(existing) => *existing = existing.saturating_add(count),
            None => {
                counts.insert(next.to_string(), count);
            }
        }
    }

    /// Inserts a whole distribution, dropping zero counts. An all-zero
    /// distribution leaves no entry behind.
    pub fn insert_distribution(&mut self, context: ContextKey, counts: TokenCounts) {
        let counts: TokenCounts = counts.into_iter().filter(|(_, c)| *c > 0).collect();
        if !counts.is_empty() {
            self.contexts.insert(context, counts);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ContextKey, &TokenCounts)> {
        self.contexts.iter()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Sum of each token's count across every context of the group.
    pub fn global_frequencies(&self) -> TokenCounts {
        let mut global = TokenCounts::new();
        for counts in self.contexts.values() {
            for (token, count) in counts {
                let total = global.entry(token.clone()).or_insert(0);
                *total = total.saturating_add(*count);
            }
        }
        global
    }
}

/// Language group -> context -> next token -> count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyTable {
    groups: BTreeMap<LanguageGroup, GroupTable>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(&self, group: &str) -> Option<&GroupTable> {
        self.groups.get(group)
    }

    pub fn group_mut(&mut self, group: &str) -> &mut GroupTable {
        self.groups.entry(group.to_string()).or_default()
    }

    pub fn insert_group(&mut self, group: LanguageGroup, table: GroupTable) {
        if table.is_empty() {
            self.groups.remove(&group);
        } else {
            self.groups.insert(group, table);
        }
    }

    pub fn groups(&self) -> impl Iterator<Item = (&LanguageGroup, &GroupTable)> {
        self.groups.iter()
    }

    pub fn group_names(&self) -> impl Iterator<Item = &LanguageGroup> {
        self.groups.keys()
    }

    pub fn context_count(&self) -> usize {
        self.groups.values().map(GroupTable::len).sum()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }
}

/// Sum of a distribution's counts. Widened so that any number of `u64`
/// counts adds up without overflow.
pub fn total_count(counts: &TokenCounts) -> u128 {
    counts.values().map(|&count| u128::from(count)).sum()
}

/// Read access shared by the static model and the session index, so the
/// scorer can run against either.
pub trait NgramSource {
    /// Model order; contexts hold `n - 1` tokens.
    fn order(&self) -> usize;

    fn table(&self) -> &FrequencyTable;

    fn group(&self, group: &str) -> Option<&GroupTable> {
        self.table().group(group)
    }

    fn vocabulary(&self, _group: &str) -> Option<&[Token]> {
        None
    }

    fn global_frequencies(&self, _group: &str) -> Option<&TokenCounts> {
        None
    }

    fn smoothing(&self) -> Smoothing {
        Smoothing::None
    }
}
