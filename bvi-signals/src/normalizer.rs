//! Identity Normalizer
//!
//! Maps a raw filer name to a canonical company id:
//! 1. Split compound `"<DBA NAME>, <LEGAL NAME>"` names and keep the legal part
//! 2. Normalize (uppercase, strip punctuation, collapse whitespace,
//!    standardize legal suffixes)
//! 3. Exact raw-name alias, then exact normalized-form alias
//! 4. Best fuzzy match against existing canonical names at or above the threshold
//! 5. Otherwise create a new identity
//!
//! Deterministic for a given sequence of previously seen names, but not
//! commutative: which string becomes canonical depends on arrival order.

use bvi_common::config::MatchingConfig;
use bvi_common::{AliasEntry, CompanyId, CompanyIdentity, UNKNOWN_FILER_ID};
use tracing::debug;

use crate::error::ClassifyResult;
use crate::similarity::{scorer_for, SimilarityScorer};
use crate::store::SignalStore;

/// Canonical legal-suffix tokens after standardization
const LEGAL_SUFFIXES: &[&str] = &["LLC", "LLP", "LP", "PLLC", "INC", "CORP", "CO", "LTD"];

/// Multi-token suffix spellings, longest first
const SUFFIX_PHRASES: &[(&[&str], &str)] = &[
    (&["LIMITED", "LIABILITY", "COMPANY"], "LLC"),
    (&["LIMITED", "LIABILITY", "CO"], "LLC"),
    (&["LIMITED", "LIABILITY", "PARTNERSHIP"], "LLP"),
    (&["LIMITED", "PARTNERSHIP"], "LP"),
    (&["P", "L", "L", "C"], "PLLC"),
    (&["L", "L", "C"], "LLC"),
    (&["L", "L", "P"], "LLP"),
    (&["L", "P"], "LP"),
];

/// Single-token suffix spellings
const SUFFIX_TOKENS: &[(&str, &str)] = &[
    ("INCORPORATED", "INC"),
    ("CORPORATION", "CORP"),
    ("COMPANY", "CO"),
    ("LIMITED", "LTD"),
];

/// Normalize a filer name for comparison.
///
/// `"Acme Spirits, L.L.C."` and `"ACME SPIRITS LLC"` both become
/// `"ACME SPIRITS LLC"`. Returns an empty string when nothing alphanumeric
/// remains.
pub fn normalize_name(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '.' | '\'' | '\u{2019}' => {}
            '&' => cleaned.push_str(" AND "),
            c if c.is_alphanumeric() => cleaned.extend(c.to_uppercase()),
            _ => cleaned.push(' '),
        }
    }

    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    let mut standardized: Vec<&str> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    'tokens: while i < tokens.len() {
        for (phrase, canonical) in SUFFIX_PHRASES {
            if tokens[i..].starts_with(phrase) {
                standardized.push(canonical);
                i += phrase.len();
                continue 'tokens;
            }
        }
        let token = SUFFIX_TOKENS
            .iter()
            .find(|(spelling, _)| *spelling == tokens[i])
            .map(|(_, canonical)| *canonical)
            .unwrap_or(tokens[i]);
        standardized.push(token);
        i += 1;
    }

    standardized.join(" ")
}

/// Normalize a brand or variant name into a lookup key.
///
/// Only case and whitespace are folded; punctuation is significant in
/// product names.
pub fn normalize_key(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_uppercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_only_legal_suffix(normalized: &str) -> bool {
    normalized
        .split_whitespace()
        .all(|token| LEGAL_SUFFIXES.contains(&token))
}

/// Split a compound `"<DBA NAME>, <LEGAL NAME>"` filer name.
///
/// Returns `(legal_name, dba_name)`. A comma only introduces a legal name
/// when the text after it is more than a bare legal suffix, so
/// `"Acme Spirits, L.L.C."` is not treated as a DBA.
pub fn split_dba(raw: &str) -> (&str, Option<&str>) {
    let trimmed = raw.trim();
    let Some((before, after)) = trimmed.split_once(',') else {
        return (trimmed, None);
    };

    let (before, after) = (before.trim(), after.trim());
    let normalized_after = normalize_name(after);
    if normalized_after.is_empty() || is_only_legal_suffix(&normalized_after) {
        return (trimmed, None);
    }

    if normalize_name(before).is_empty() {
        return (after, None);
    }

    (after, Some(before))
}

/// How a raw name was resolved
#[derive(Debug, Clone, PartialEq)]
pub enum MatchMethod {
    /// Empty or unusable name
    UnknownFiler,
    /// Raw string already bound
    Alias,
    /// Normalized form equals a bound alias's normalized form
    Normalized,
    /// Fuzzy match against an existing canonical name
    Fuzzy { score: f64 },
    /// New identity created
    Created,
}

/// Outcome of resolving one raw filer name
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub company_id: CompanyId,
    pub method: MatchMethod,
    /// Normalized legal-entity name used for matching (empty for unknown)
    pub normalized_name: String,
    pub dba_name: Option<String>,
}

impl Resolution {
    fn unknown() -> Self {
        Self {
            company_id: UNKNOWN_FILER_ID,
            method: MatchMethod::UnknownFiler,
            normalized_name: String::new(),
            dba_name: None,
        }
    }
}

/// Resolves raw filer names against the identities held by a store
pub struct IdentityNormalizer {
    scorer: Box<dyn SimilarityScorer>,
    threshold: f64,
    min_fuzzy_length: usize,
}

impl IdentityNormalizer {
    pub fn new(scorer: Box<dyn SimilarityScorer>, threshold: f64, min_fuzzy_length: usize) -> Self {
        Self {
            scorer,
            threshold,
            min_fuzzy_length,
        }
    }

    pub fn from_config(config: &MatchingConfig) -> Self {
        Self::new(
            scorer_for(config.scorer),
            config.similarity_threshold,
            config.min_fuzzy_length,
        )
    }

    /// Work out what a raw name resolves to without touching the store.
    ///
    /// A `Created` result carries the id the identity would receive.
    pub fn preview<S: SignalStore + ?Sized>(&self, raw_name: &str, store: &S) -> Resolution {
        if raw_name.trim().is_empty() {
            return Resolution::unknown();
        }

        let (legal, dba) = split_dba(raw_name);
        let normalized = normalize_name(legal);
        let dba_name = dba.map(str::to_string);

        if let Some(company_id) = store.lookup_alias(raw_name) {
            return Resolution {
                company_id,
                method: MatchMethod::Alias,
                normalized_name: normalized,
                dba_name,
            };
        }

        if normalized.is_empty() {
            return Resolution {
                dba_name,
                ..Resolution::unknown()
            };
        }

        if let Some(company_id) = store.lookup_normalized(&normalized) {
            return Resolution {
                company_id,
                method: MatchMethod::Normalized,
                normalized_name: normalized,
                dba_name,
            };
        }

        if let Some((company_id, score)) = self.best_fuzzy_match(&normalized, store) {
            return Resolution {
                company_id,
                method: MatchMethod::Fuzzy { score },
                normalized_name: normalized,
                dba_name,
            };
        }

        Resolution {
            company_id: CompanyId::for_normalized_name(&normalized),
            method: MatchMethod::Created,
            normalized_name: normalized,
            dba_name,
        }
    }

    /// Resolve a raw name, creating the identity and binding the alias as
    /// needed.
    pub fn resolve<S: SignalStore + ?Sized>(
        &self,
        raw_name: &str,
        store: &mut S,
    ) -> ClassifyResult<Resolution> {
        let resolution = self.preview(raw_name, store);

        match resolution.method {
            MatchMethod::Alias => return Ok(resolution),
            MatchMethod::UnknownFiler if raw_name.trim().is_empty() => return Ok(resolution),
            MatchMethod::Created => {
                let (legal, _) = split_dba(raw_name);
                store.create_company(CompanyIdentity {
                    id: resolution.company_id,
                    display_name: legal.to_string(),
                    normalized_name: resolution.normalized_name.clone(),
                    dba_names: Vec::new(),
                })?;
            }
            _ => {}
        }

        store.bind_alias(AliasEntry {
            raw_name: raw_name.to_string(),
            normalized_name: resolution.normalized_name.clone(),
            company_id: resolution.company_id,
        })?;

        if let Some(dba) = &resolution.dba_name {
            store.add_dba(resolution.company_id, dba)?;
        }

        debug!(
            raw_name = %raw_name,
            company_id = %resolution.company_id,
            method = ?resolution.method,
            "Resolved filer name"
        );

        Ok(resolution)
    }

    /// Highest-scoring identity at or above the threshold.
    ///
    /// Identities are visited in creation order and only a strictly higher
    /// score replaces the current best, so ties go to the oldest identity.
    fn best_fuzzy_match<S: SignalStore + ?Sized>(
        &self,
        normalized: &str,
        store: &S,
    ) -> Option<(CompanyId, f64)> {
        if normalized.chars().count() < self.min_fuzzy_length {
            return None;
        }

        let mut best: Option<(CompanyId, f64)> = None;
        for company in store.companies() {
            if company.id.is_unknown_filer() {
                continue;
            }
            let score = self.scorer.score(normalized, &company.normalized_name);
            if score < self.threshold {
                continue;
            }
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((company.id, score)),
            }
        }
        best
    }
}
