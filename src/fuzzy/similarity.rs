// File: src/fuzzy/similarity.rs
use crate::core::context::ContextKey;
use crate::core::table::{total_count, GroupTable};
use crate::core::types::Token;
use std::collections::{BTreeMap, HashSet};

/// Suffix-aligned match ratio: both sequences are compared from their last
/// token backwards over the length of the shorter one, and the number of equal
/// positions is divided by that length. Empty input scores 0.
pub fn suffix_similarity(a: &[Token], b: &[Token]) -> f64 {
    let shorter = a.len().min(b.len());
    if shorter == 0 {
        return 0.0;
    }
    let matching = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .filter(|(x, y)| x == y)
        .count();
    matching as f64 / shorter as f64
}

/// Hard cap on the number of stored contexts compared in one request.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyBudget {
    remaining: usize,
    spent: usize,
}

impl FuzzyBudget {
    pub fn new(limit: usize) -> Self {
        Self { remaining: limit, spent: 0 }
    }

    /// Consumes one comparison; `false` once the budget is exhausted.
    pub fn try_spend(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.spent += 1;
        true
    }

    pub fn spent(&self) -> usize {
        self.spent
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FuzzySettings {
    /// Minimum similarity for a stored context, and minimum confidence for a
    /// candidate it contributes.
    pub threshold: f64,
    /// Multiplier (< 1) marking fuzzy candidates as less trusted than exact ones.
    pub dampening: f64,
    /// Scanning stops once more than this many candidates were collected.
    pub overflow_cap: usize,
}

#[derive(Debug, Default)]
pub struct FuzzyOutcome {
    /// Best confidence seen per token.
    pub candidates: BTreeMap<Token, f64>,
    pub overflowed: bool,
}

/// Scans stored contexts of `groups` in order for near matches of `context`.
/// Tokens in `exclude` are never emitted. The scan ends when the budget runs
/// out or the candidate count passes `settings.overflow_cap`.
pub fn scan<'t>(
    groups: impl IntoIterator<Item = &'t GroupTable>,
    context: &ContextKey,
    settings: &FuzzySettings,
    budget: &mut FuzzyBudget,
    exclude: &HashSet<Token>,
) -> FuzzyOutcome {
    let mut outcome = FuzzyOutcome::default();

    'groups: for table in groups {
        for (stored, counts) in table.iter() {
            if !budget.try_spend() {
                break 'groups;
            }
            if stored == context {
                continue;
            }

            let similarity = suffix_similarity(context.tokens(), stored.tokens());
            if similarity <= 0.0 || similarity < settings.threshold {
                continue;
            }

            let total = total_count(counts);
            if total == 0 {
                continue;
            }
            for (token, count) in counts {
                if exclude.contains(token) {
                    continue;
                }
                let confidence = similarity * (*count as f64 / total as f64) * settings.dampening;
                if confidence < settings.threshold {
                    continue;
                }
                let best = outcome.candidates.entry(token.clone()).or_insert(0.0);
                if confidence > *best {
                    *best = confidence;
                }
            }

            if outcome.candidates.len() > settings.overflow_cap {
                outcome.overflowed = true;
                break 'groups;
            }
        }
    }

    outcome
}
