// src/core/scoring.rs
//! Exact, fuzzy and smoothed next-token scoring against one n-gram source.

use crate::core::context::{extract_context, ContextKey};
use crate::core::model::Smoothing;
use crate::core::table::{total_count, NgramSource};
use crate::core::types::{LanguageGroup, Source, Suggestion, Token, TokenCounts};
use crate::fuzzy::similarity::{self, FuzzyBudget, FuzzySettings};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

/// Per-call scoring switches and thresholds. Built from the config and passed
/// by value into every call; scoring reads nothing else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringParams {
    pub max_results: usize,
    pub min_confidence: f64,
    pub fuzzy: bool,
    /// Maximum number of stored contexts compared by the fuzzy pass.
    pub fuzzy_budget: usize,
    pub smoothing: bool,
    pub fuzzy_dampening: f64,
    /// Fuzzy acceptance threshold as a fraction of `min_confidence`.
    pub fuzzy_threshold_ratio: f64,
    /// Same, used when smoothing is active for the source.
    pub smoothed_fuzzy_threshold_ratio: f64,
    /// Fuzzy runs only while exact hits are below `max_results * fuzzy_trigger_multiple`.
    pub fuzzy_trigger_multiple: usize,
    /// Fuzzy stops once it holds more than `max_results * fuzzy_overflow_multiple` candidates.
    pub fuzzy_overflow_multiple: usize,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            max_results: 5,
            min_confidence: 0.1,
            fuzzy: true,
            fuzzy_budget: 5_000,
            smoothing: true,
            fuzzy_dampening: 0.8,
            fuzzy_threshold_ratio: 0.5,
            smoothed_fuzzy_threshold_ratio: 0.3,
            fuzzy_trigger_multiple: 2,
            fuzzy_overflow_multiple: 5,
        }
    }
}

impl ScoringParams {
    /// Exact matching only: no fuzzy pass, no smoothing.
    pub fn exact_only(max_results: usize, min_confidence: f64) -> Self {
        Self {
            max_results,
            min_confidence,
            fuzzy: false,
            smoothing: false,
            ..Self::default()
        }
    }
}

/// Ranks next-token candidates for the most recent `tokens` against `source`.
///
/// Only the last `n - 1` tokens are used; shorter input, unknown groups and
/// empty tables all yield an empty list. Results are tagged with `tag`, sorted
/// by confidence descending (ties by token) and truncated to `max_results`.
pub fn score<S: NgramSource + ?Sized>(
    source: &S,
    tag: Source,
    tokens: &[Token],
    groups: &[LanguageGroup],
    params: &ScoringParams,
) -> Vec<Suggestion> {
    if params.max_results == 0 {
        return Vec::new();
    }
    let Some(context) = extract_context(tokens, source.order()) else {
        return Vec::new();
    };

    let mut used: HashSet<Token> = HashSet::new();
    let mut results: Vec<Suggestion> = Vec::new();

    exact_matches(source, tag, &context, groups, params, &mut used, &mut results);
    let exact_count = results.len();

    let smoothing = if params.smoothing { source.smoothing() } else { Smoothing::None };

    let mut fuzzy_count = 0;
    if params.fuzzy && exact_count < params.max_results.saturating_mul(params.fuzzy_trigger_multiple) {
        fuzzy_count = fuzzy_matches(source, tag, &context, groups, params, smoothing.is_enabled(), &mut used, &mut results);
    }

    let mut smoothed_count = 0;
    if let Smoothing::Additive { alpha } = smoothing {
        if results.len() < params.max_results {
            smoothed_count = smoothed_matches(source, tag, &context, groups, alpha, params.max_results, &mut used, &mut results);
        }
    }

    debug!(
        context = %context,
        exact = exact_count,
        fuzzy = fuzzy_count,
        smoothed = smoothed_count,
        "scored context"
    );

    sort_by_confidence(&mut results);
    results.truncate(params.max_results);
    results
}

fn exact_matches<S: NgramSource + ?Sized>(
    source: &S,
    tag: Source,
    context: &ContextKey,
    groups: &[LanguageGroup],
    params: &ScoringParams,
    used: &mut HashSet<Token>,
    results: &mut Vec<Suggestion>,
) {
    for group in groups {
        let Some(counts) = source.group(group).and_then(|table| table.get(context)) else {
            continue;
        };
        let total = total_count(counts);
        if total == 0 {
            continue;
        }
        for (token, count) in counts {
            let confidence = *count as f64 / total as f64;
            // first group to emit a token keeps it
            if confidence >= params.min_confidence && used.insert(token.clone()) {
                results.push(Suggestion::new(token.clone(), confidence, tag));
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn fuzzy_matches<S: NgramSource + ?Sized>(
    source: &S,
    tag: Source,
    context: &ContextKey,
    groups: &[LanguageGroup],
    params: &ScoringParams,
    smoothing_active: bool,
    used: &mut HashSet<Token>,
    results: &mut Vec<Suggestion>,
) -> usize {
    let ratio = if smoothing_active {
        params.smoothed_fuzzy_threshold_ratio
    } else {
        params.fuzzy_threshold_ratio
    };
    let settings = FuzzySettings {
        threshold: params.min_confidence * ratio,
        dampening: params.fuzzy_dampening,
        overflow_cap: params.max_results.saturating_mul(params.fuzzy_overflow_multiple),
    };

    let mut budget = FuzzyBudget::new(params.fuzzy_budget);
    let tables = groups.iter().filter_map(|group| source.group(group));
    let outcome = similarity::scan(tables, context, &settings, &mut budget, used);

    debug!(
        comparisons = budget.spent(),
        exhausted = budget.is_exhausted(),
        overflowed = outcome.overflowed,
        "fuzzy scan finished"
    );

    let emitted = outcome.candidates.len();
    for (token, confidence) in outcome.candidates {
        used.insert(token.clone());
        results.push(Suggestion::new(token, confidence, tag));
    }
    emitted
}

#[allow(clippy::too_many_arguments)]
fn smoothed_matches<S: NgramSource + ?Sized>(
    source: &S,
    tag: Source,
    context: &ContextKey,
    groups: &[LanguageGroup],
    alpha: f64,
    max_results: usize,
    used: &mut HashSet<Token>,
    results: &mut Vec<Suggestion>,
) -> usize {
    let before = results.len();
    for group in groups {
        if results.len() >= max_results {
            break;
        }
        let Some(vocab) = source.vocabulary(group) else {
            continue;
        };
        let observed = source.group(group).and_then(|table| table.get(context));
        let total = observed.map(total_count).unwrap_or(0);

        let candidates = match observed {
            Some(counts) if total > 0 => additive_candidates(counts, total, vocab, alpha),
            _ => match source.global_frequencies(group) {
                Some(global) => unigram_candidates(global),
                None => continue,
            },
        };

        for (token, confidence) in candidates {
            if results.len() >= max_results {
                break;
            }
            if used.insert(token.clone()) {
                results.push(Suggestion::new(token, confidence, tag));
            }
        }
    }
    results.len() - before
}

/// Global token frequency of a group, best first.
fn unigram_candidates(global: &TokenCounts) -> Vec<(Token, f64)> {
    let total = total_count(global);
    if total == 0 {
        return Vec::new();
    }
    let mut candidates: Vec<(Token, f64)> = global
        .iter()
        .map(|(token, count)| (token.clone(), *count as f64 / total as f64))
        .collect();
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    candidates
}

/// `(count + alpha) / (total + alpha * |V|)` for every vocabulary token, best
/// first. Observed tokens come first by count; unseen tokens all share the
/// floor value and follow in vocabulary order.
fn additive_candidates(counts: &TokenCounts, total: u128, vocab: &[Token], alpha: f64) -> Vec<(Token, f64)> {
    let denominator = total as f64 + alpha * vocab.len() as f64;
    let smoothed = |count: u64| (count as f64 + alpha) / denominator;

    let mut observed: Vec<(Token, f64)> = counts
        .iter()
        .map(|(token, count)| (token.clone(), smoothed(*count)))
        .collect();
    observed.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let floor = smoothed(0);
    observed.extend(
        vocab
            .iter()
            .filter(|token| !counts.contains_key(*token))
            .map(|token| (token.clone(), floor)),
    );
    observed
}

/// Confidence descending, then token ascending so equal scores keep a stable order.
pub(crate) fn sort_by_confidence(results: &mut [Suggestion]) {
    results.sort_by(|a, b| match b.confidence.total_cmp(&a.confidence) {
        Ordering::Equal => a.token.cmp(&b.token),
        other => other,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{ModelMeta, StaticModel};
    use crate::core::table::FrequencyTable;
    use quickcheck::{QuickCheck, TestResult};
    use std::collections::BTreeMap;

    fn toks(items: &[&str]) -> Vec<Token> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn groups(items: &[&str]) -> Vec<LanguageGroup> {
        toks(items)
    }

    fn model_with(
        n: usize,
        smoothing: Smoothing,
        entries: &[(&str, &[&str], &str, u64)],
        vocab: &[(&str, &[&str])],
    ) -> StaticModel {
        let mut table = FrequencyTable::new();
        for (group, context, next, count) in entries {
            table.group_mut(group).increment(ContextKey::new(toks(context)), next, *count);
        }
        let vocab = vocab
            .iter()
            .map(|(group, tokens)| (group.to_string(), toks(tokens)))
            .collect::<BTreeMap<_, _>>();
        let meta = ModelMeta {
            version: "test".into(),
            n,
            file_extensions: Vec::new(),
            total_patterns: 0,
            smoothing,
        };
        StaticModel::new(meta, table, vocab).unwrap()
    }

    fn foo_model() -> StaticModel {
        model_with(
            3,
            Smoothing::None,
            &[("A", &["foo", "("], "bar", 3), ("A", &["foo", "("], "baz", 1)],
            &[],
        )
    }

    #[test]
    fn exact_match_distribution() {
        let model = foo_model();
        let params = ScoringParams::exact_only(5, 0.2);
        let results = score(&model, Source::Static, &toks(&["foo", "("]), &groups(&["A"]), &params);
        assert_eq!(
            results,
            vec![
                Suggestion::new("bar", 0.75, Source::Static),
                Suggestion::new("baz", 0.25, Source::Static),
            ]
        );
    }

    #[test]
    fn uses_only_the_trailing_context() {
        let model = foo_model();
        let results = score(
            &model,
            Source::Static,
            &toks(&["x", "=", "foo", "("]),
            &groups(&["A"]),
            &ScoringParams::exact_only(5, 0.0),
        );
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn min_confidence_filters() {
        let model = foo_model();
        let results = score(&model, Source::Static, &toks(&["foo", "("]), &groups(&["A"]), &ScoringParams::exact_only(5, 0.5));
        assert_eq!(results, vec![Suggestion::new("bar", 0.75, Source::Static)]);
    }

    #[test]
    fn short_context_and_unknown_group_are_empty() {
        let model = foo_model();
        let params = ScoringParams::default();
        assert!(score(&model, Source::Static, &toks(&["("]), &groups(&["A"]), &params).is_empty());
        assert!(score(&model, Source::Static, &toks(&["foo", "("]), &groups(&["B"]), &params).is_empty());
        assert!(score(&model, Source::Static, &toks(&["foo", "("]), &[], &params).is_empty());
    }

    #[test]
    fn first_group_wins_on_collision() {
        let model = model_with(
            2,
            Smoothing::None,
            &[(".js", &["x"], "a", 1), (".js", &["x"], "b", 1), (".jsx", &["x"], "a", 9), (".jsx", &["x"], "c", 1)],
            &[],
        );
        let results = score(&model, Source::Static, &toks(&["x"]), &groups(&[".js", ".jsx"]), &ScoringParams::exact_only(5, 0.0));
        let a = results.iter().find(|s| s.token == "a").unwrap();
        assert_eq!(a.confidence, 0.5);
        assert!(results.iter().any(|s| s.token == "c"));
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn exact_confidences_sum_to_one() {
        fn prop(counts: Vec<u8>) -> TestResult {
            let counts: Vec<u64> = counts.into_iter().take(8).map(|c| c as u64 + 1).collect();
            if counts.is_empty() {
                return TestResult::discard();
            }
            let mut table = FrequencyTable::new();
            for (i, count) in counts.iter().enumerate() {
                table.group_mut("g").increment(ContextKey::new(vec!["k".to_string()]), &format!("t{i}"), *count);
            }
            let meta = ModelMeta {
                version: "p".into(),
                n: 2,
                file_extensions: Vec::new(),
                total_patterns: 0,
                smoothing: Smoothing::None,
            };
            let model = StaticModel::new(meta, table, BTreeMap::new()).unwrap();
            let results = score(
                &model,
                Source::Static,
                &["k".to_string()],
                &["g".to_string()],
                &ScoringParams::exact_only(usize::MAX, 0.0),
            );
            let sum: f64 = results.iter().map(|s| s.confidence).sum();
            TestResult::from_bool(results.len() == counts.len() && (sum - 1.0).abs() < 1e-9)
        }
        QuickCheck::new().tests(100).quickcheck(prop as fn(Vec<u8>) -> TestResult);
    }

    #[test]
    fn fuzzy_fills_when_exact_misses() {
        let model = model_with(
            3,
            Smoothing::None,
            &[("A", &["bar", "("], "x", 1)],
            &[],
        );
        let params = ScoringParams { min_confidence: 0.2, ..ScoringParams::default() };
        let results = score(&model, Source::Static, &toks(&["foo", "("]), &groups(&["A"]), &params);
        // similarity 0.5, full distribution share, dampening 0.8
        assert_eq!(results, vec![Suggestion::new("x", 0.5 * 1.0 * 0.8, Source::Static)]);
    }

    #[test]
    fn fuzzy_never_duplicates_exact_tokens() {
        let model = model_with(
            3,
            Smoothing::None,
            &[("A", &["foo", "("], "x", 1), ("A", &["bar", "("], "x", 1), ("A", &["bar", "("], "y", 1)],
            &[],
        );
        let results = score(&model, Source::Static, &toks(&["foo", "("]), &groups(&["A"]), &ScoringParams::default());
        assert_eq!(results[0], Suggestion::new("x", 1.0, Source::Static));
        assert_eq!(results.iter().filter(|s| s.token == "x").count(), 1);
        assert!(results.iter().any(|s| s.token == "y"));
    }

    #[test]
    fn fuzzy_runs_only_below_trigger_multiple() {
        let params = ScoringParams {
            max_results: 3,
            min_confidence: 0.2,
            fuzzy_trigger_multiple: 1,
            ..ScoringParams::default()
        };
        let near = ("A", &["bar", "("][..], "z", 1);

        // three exact hits reach 3 * 1, so the near context is never consulted
        let saturated = model_with(
            3,
            Smoothing::None,
            &[("A", &["foo", "("], "x", 1), ("A", &["foo", "("], "y", 1), ("A", &["foo", "("], "w", 1), near],
            &[],
        );
        let results = score(&saturated, Source::Static, &toks(&["foo", "("]), &groups(&["A"]), &params);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|s| s.token != "z"));

        let sparse = model_with(
            3,
            Smoothing::None,
            &[("A", &["foo", "("], "x", 1), ("A", &["foo", "("], "y", 1), near],
            &[],
        );
        let results = score(&sparse, Source::Static, &toks(&["foo", "("]), &groups(&["A"]), &params);
        assert_eq!(results.len(), 3);
        assert_eq!(results[2], Suggestion::new("z", 0.5 * 0.8, Source::Static));
    }

    #[test]
    fn fuzzy_budget_limits_compared_contexts() {
        // contexts are scanned in key order: a, b, c
        let model = model_with(
            3,
            Smoothing::None,
            &[("A", &["a", "("], "p", 1), ("A", &["b", "("], "q", 1), ("A", &["c", "("], "r", 1)],
            &[],
        );
        let query = toks(&["foo", "("]);

        let full = score(&model, Source::Static, &query, &groups(&["A"]), &ScoringParams::default());
        assert_eq!(full.len(), 3);

        let params = ScoringParams { fuzzy_budget: 2, ..ScoringParams::default() };
        let partial = score(&model, Source::Static, &query, &groups(&["A"]), &params);
        let tokens: Vec<&str> = partial.iter().map(|s| s.token.as_str()).collect();
        assert_eq!(tokens, vec!["p", "q"]);
    }

    #[test]
    fn fuzzy_scan_stops_at_overflow_cap() {
        let model = model_with(
            3,
            Smoothing::None,
            &[
                ("A", &["a", "("], "p", 1),
                ("A", &["a", "("], "p2", 1),
                ("A", &["b", "("], "q", 1),
                ("A", &["c", "("], "r", 1),
            ],
            &[],
        );
        // cap of 2 is passed after context b, so r is never collected
        let params = ScoringParams { max_results: 2, fuzzy_overflow_multiple: 1, ..ScoringParams::default() };
        let results = score(&model, Source::Static, &toks(&["foo", "("]), &groups(&["A"]), &params);
        assert_eq!(results[0], Suggestion::new("q", 0.5 * 0.8, Source::Static));
        assert!(results.iter().all(|s| s.token != "r"));
    }

    #[test]
    fn huge_counts_do_not_overflow_totals() {
        let model = model_with(
            2,
            Smoothing::Additive { alpha: 1.0 },
            &[("A", &["x"], "a", u64::MAX), ("A", &["x"], "b", u64::MAX), ("A", &["x"], "c", u64::MAX)],
            &[("A", &["a", "b", "c", "d"])],
        );
        let exact = score(&model, Source::Static, &toks(&["x"]), &groups(&["A"]), &ScoringParams::exact_only(5, 0.0));
        assert_eq!(exact.len(), 3);
        for suggestion in &exact {
            assert!((suggestion.confidence - 1.0 / 3.0).abs() < 1e-12);
        }

        // unseen context goes through the saturated global frequencies
        let params = ScoringParams { fuzzy: false, ..ScoringParams::default() };
        let fallback = score(&model, Source::Static, &toks(&["y"]), &groups(&["A"]), &params);
        assert_eq!(fallback.len(), 3);

        // smoothing over the huge distribution fills the slots exact left empty
        let strict = ScoringParams { fuzzy: false, min_confidence: 0.9, ..ScoringParams::default() };
        let smoothed = score(&model, Source::Static, &toks(&["x"]), &groups(&["A"]), &strict);
        assert_eq!(smoothed.len(), 4);
        assert!(smoothed.iter().all(|s| s.confidence.is_finite()));
    }

    #[test]
    fn fuzzy_disabled_stays_exact() {
        let model = model_with(3, Smoothing::None, &[("A", &["bar", "("], "x", 1)], &[]);
        let params = ScoringParams { fuzzy: false, ..ScoringParams::default() };
        assert!(score(&model, Source::Static, &toks(&["foo", "("]), &groups(&["A"]), &params).is_empty());
    }

    #[test]
    fn additive_smoothing_covers_vocabulary() {
        let model = model_with(
            2,
            Smoothing::Additive { alpha: 1.0 },
            &[("A", &["x"], "a", 3), ("A", &["x"], "b", 1)],
            &[("A", &["a", "b", "c", "d"])],
        );
        // nothing clears the exact threshold, so every slot comes from smoothing
        let params = ScoringParams { fuzzy: false, min_confidence: 0.9, ..ScoringParams::default() };
        let results = score(&model, Source::Static, &toks(&["x"]), &groups(&["A"]), &params);

        // total 4, |V| 4, alpha 1 -> denominator 8
        assert_eq!(results.len(), 4);
        assert_eq!(results[0], Suggestion::new("a", 0.5, Source::Static));
        assert_eq!(results[1], Suggestion::new("b", 0.25, Source::Static));
        for unseen in ["c", "d"] {
            let s = results.iter().find(|s| s.token == unseen).unwrap();
            assert_eq!(s.confidence, 1.0 / 8.0);
        }
    }

    #[test]
    fn unseen_context_falls_back_to_global_frequency() {
        let model = model_with(
            2,
            Smoothing::Additive { alpha: 1.0 },
            &[("A", &["x"], "a", 3), ("A", &["y"], "a", 1), ("A", &["y"], "b", 4)],
            &[("A", &["a", "b"])],
        );
        let params = ScoringParams { fuzzy: false, ..ScoringParams::default() };
        let results = score(&model, Source::Static, &toks(&["zzz"]), &groups(&["A"]), &params);
        assert_eq!(
            results,
            vec![
                Suggestion::new("a", 0.5, Source::Static),
                Suggestion::new("b", 0.5, Source::Static),
            ]
        );
    }

    #[test]
    fn smoothing_requires_vocabulary_and_switch() {
        let with_vocab = model_with(2, Smoothing::Additive { alpha: 1.0 }, &[("A", &["x"], "a", 1)], &[("A", &["a", "b"])]);
        let no_vocab = model_with(2, Smoothing::Additive { alpha: 1.0 }, &[("A", &["x"], "a", 1)], &[]);
        let params = ScoringParams { fuzzy: false, ..ScoringParams::default() };
        let off = ScoringParams { smoothing: false, ..params };

        assert!(score(&no_vocab, Source::Static, &toks(&["q"]), &groups(&["A"]), &params).is_empty());
        assert!(score(&with_vocab, Source::Static, &toks(&["q"]), &groups(&["A"]), &off).is_empty());
        assert!(!score(&with_vocab, Source::Static, &toks(&["q"]), &groups(&["A"]), &params).is_empty());
    }

    #[test]
    fn smoothing_fills_only_remaining_slots() {
        let model = model_with(
            2,
            Smoothing::Additive { alpha: 0.5 },
            &[("A", &["x"], "a", 1)],
            &[("A", &["a", "b", "c", "d", "e", "f"])],
        );
        let params = ScoringParams { fuzzy: false, max_results: 3, ..ScoringParams::default() };
        let results = score(&model, Source::Static, &toks(&["x"]), &groups(&["A"]), &params);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].token, "a");
        assert_eq!(results[0].confidence, 1.0);
        // unseen tokens follow vocabulary order
        assert_eq!(results[1].token, "b");
        assert_eq!(results[2].token, "c");
    }

    #[test]
    fn zero_max_results_is_empty() {
        let model = foo_model();
        let params = ScoringParams { max_results: 0, ..ScoringParams::default() };
        assert!(score(&model, Source::Static, &toks(&["foo", "("]), &groups(&["A"]), &params).is_empty());
    }
}
