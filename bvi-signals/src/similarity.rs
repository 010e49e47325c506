//! Pluggable similarity scoring for fuzzy company matching
//!
//! Scores are in [0.0, 1.0]; 1.0 means identical for the purposes of the
//! scorer. Inputs are expected to be normalized names.

use bvi_common::config::ScorerKind;

/// Narrow scoring interface used by the identity normalizer
pub trait SimilarityScorer: Send + Sync {
    fn score(&self, a: &str, b: &str) -> f64;

    fn name(&self) -> &'static str;
}

/// Jaro-Winkler (favours shared prefixes)
#[derive(Debug, Default, Clone, Copy)]
pub struct JaroWinkler;

impl SimilarityScorer for JaroWinkler {
    fn score(&self, a: &str, b: &str) -> f64 {
        strsim::jaro_winkler(a, b)
    }

    fn name(&self) -> &'static str {
        "jaro_winkler"
    }
}

/// Edit-distance ratio
#[derive(Debug, Default, Clone, Copy)]
pub struct NormalizedLevenshtein;

impl SimilarityScorer for NormalizedLevenshtein {
    fn score(&self, a: &str, b: &str) -> f64 {
        strsim::normalized_levenshtein(a, b)
    }

    fn name(&self) -> &'static str {
        "normalized_levenshtein"
    }
}

/// Token-sort ratio
///
/// Sorts each side's tokens and takes the edit-distance ratio of the
/// sorted strings, so word order does not matter. Extra words on one side
/// count against the score in full: a name is never a match for a longer
/// name that merely contains its tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenSort;

impl SimilarityScorer for TokenSort {
    fn score(&self, a: &str, b: &str) -> f64 {
        let sorted_a = sorted_tokens(a);
        let sorted_b = sorted_tokens(b);
        if sorted_a.is_empty() || sorted_b.is_empty() {
            return 0.0;
        }
        strsim::normalized_levenshtein(&sorted_a, &sorted_b)
    }

    fn name(&self) -> &'static str {
        "token_sort"
    }
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Build the configured scorer
pub fn scorer_for(kind: ScorerKind) -> Box<dyn SimilarityScorer> {
    match kind {
        ScorerKind::JaroWinkler => Box::new(JaroWinkler),
        ScorerKind::NormalizedLevenshtein => Box::new(NormalizedLevenshtein),
        ScorerKind::TokenSort => Box::new(TokenSort),
    }
}
