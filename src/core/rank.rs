// src/core/rank.rs
use crate::core::scoring::sort_by_confidence;
use crate::core::types::{Source, Suggestion};
use std::collections::HashMap;

pub const DEFAULT_TIE_EPSILON: f64 = 1e-6;

/// Merges static and session suggestions into one ranked list.
///
/// Duplicate tokens keep the higher confidence together with its source (on an
/// exact tie the session entry wins). Entries are ordered by confidence
/// descending; when neighbours differ by less than `epsilon`, session entries
/// move ahead of static ones. The list is truncated to `max_results`.
pub fn merge_and_rank(
    static_suggestions: Vec<Suggestion>,
    session_suggestions: Vec<Suggestion>,
    max_results: usize,
    epsilon: f64,
) -> Vec<Suggestion> {
    let mut best: HashMap<String, Suggestion> = HashMap::new();
    for suggestion in static_suggestions.into_iter().chain(session_suggestions) {
        match best.get_mut(&suggestion.token) {
            Some(existing) => {
                if prefers(&suggestion, existing) {
                    *existing = suggestion;
                }
            }
            None => {
                best.insert(suggestion.token.clone(), suggestion);
            }
        }
    }

    let mut ranked: Vec<Suggestion> = best.into_values().collect();
    sort_by_confidence(&mut ranked);
    promote_session_ties(&mut ranked, epsilon);
    ranked.truncate(max_results);
    ranked
}

fn prefers(candidate: &Suggestion, existing: &Suggestion) -> bool {
    candidate.confidence > existing.confidence
        || (candidate.confidence == existing.confidence
            && candidate.source == Source::Session
            && existing.source == Source::Static)
}

/// Moves each session entry ahead of directly preceding static entries whose
/// confidence is within `epsilon` of it. "Within epsilon" is not transitive,
/// so this runs as a separate pass after the total-order sort.
fn promote_session_ties(ranked: &mut [Suggestion], epsilon: f64) {
    for i in 1..ranked.len() {
        let mut j = i;
        while j > 0
            && ranked[j].source == Source::Session
            && ranked[j - 1].source == Source::Static
            && (ranked[j - 1].confidence - ranked[j].confidence).abs() < epsilon
        {
            ranked.swap(j - 1, j);
            j -= 1;
        }
    }
}
