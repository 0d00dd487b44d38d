//! Company-name matching engine.
//!
//! Builds an in-memory index of company names and aliases, then scores
//! an office's `name`/`brand`/`operator` fields against that index to
//! decide whether the office belongs to a known company.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::models::{CandidateOffice, Company};

/// Minimum score a fuzzy match must reach to be accepted.
pub const MIN_ACCEPT: f64 = 0.86;

static CORP_SUFFIXES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "inc",
        "incorporated",
        "llc",
        "ltd",
        "limited",
        "corp",
        "corporation",
        "co",
        "company",
        "plc",
        "gmbh",
        "sa",
        "ag",
        "nv",
        "bv",
        "sarl",
        "spa",
        "holdings",
        "holding",
    ]
    .into_iter()
    .collect()
});

static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "the", "of", "and", "for", "to", "in", "on", "at", "by", "from", "with", "de", "la",
        "le", "el", "da", "do", "di", "du", "del", "des", "van", "von", "y", "a", "an",
    ]
    .into_iter()
    .collect()
});

/// Deterministic normalization: lowercase, diacritics stripped, `&` spelled
/// out, apostrophes dropped, punctuation collapsed to whitespace, corporate
/// suffixes and low-signal stopword tokens removed.
pub fn normalize_company_name(raw: &str) -> String {
    let lower = raw.to_lowercase();
    let decomposed: String = lower.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    let spelled_out = decomposed.replace('&', " and ");
    let no_apostrophes: String = spelled_out
        .chars()
        .filter(|c| *c != '\'' && *c != '\u{2019}')
        .collect();
    let spaced: String = no_apostrophes
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    spaced
        .split_whitespace()
        .filter(|t| !CORP_SUFFIXES.contains(t) && !STOPWORDS.contains(t))
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokenize(normalized: &str) -> HashSet<String> {
    normalized.split_whitespace().map(str::to_owned).collect()
}

/// Where a matched variant came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantSource {
    CompanyName,
    Alias,
}

impl VariantSource {
    fn rank(self) -> u8 {
        match self {
            Self::CompanyName => 1,
            Self::Alias => 0,
        }
    }
}

struct Variant {
    company_id: i64,
    company_name: String,
    raw: String,
    normalized: String,
    tokens: HashSet<String>,
    source: VariantSource,
}

/// In-memory index over every company's name + aliases.
pub struct CompanyIndex {
    variants: Vec<Variant>,
    exact_index: HashMap<String, Vec<usize>>,
    token_index: HashMap<String, Vec<usize>>,
}

impl CompanyIndex {
    /// Builds the index from the full company table. Rebuilt once per
    /// refresh batch; cheap relative to staleness for realistic company
    /// counts.
    pub fn build(companies: &[Company]) -> Self {
        let mut variants = Vec::new();

        for company in companies {
            let mut seen_normalized_for_company: HashSet<String> = HashSet::new();

            let mut raw_variants: Vec<(String, VariantSource)> =
                vec![(company.company_name.clone(), VariantSource::CompanyName)];
            if let Some(aliases) = &company.known_aliases {
                for alias in aliases.split('|') {
                    let alias = alias.trim();
                    if !alias.is_empty() {
                        raw_variants.push((alias.to_owned(), VariantSource::Alias));
                    }
                }
            }

            for (raw, source) in raw_variants {
                let normalized = normalize_company_name(&raw);
                if normalized.is_empty() || !seen_normalized_for_company.insert(normalized.clone())
                {
                    continue;
                }
                let tokens = tokenize(&normalized);
                variants.push(Variant {
                    company_id: company.id,
                    company_name: company.company_name.clone(),
                    raw,
                    normalized,
                    tokens,
                    source,
                });
            }
        }

        let mut exact_index: HashMap<String, Vec<usize>> = HashMap::new();
        let mut token_index: HashMap<String, Vec<usize>> = HashMap::new();

        for (idx, variant) in variants.iter().enumerate() {
            exact_index
                .entry(variant.normalized.clone())
                .or_default()
                .push(idx);
            for token in &variant.tokens {
                token_index.entry(token.clone()).or_default().push(idx);
            }
        }

        Self {
            variants,
            exact_index,
            token_index,
        }
    }

    fn shortlist(&self, tokens: &HashSet<String>) -> HashSet<usize> {
        let mut out = HashSet::new();
        for token in tokens {
            if let Some(idxs) = self.token_index.get(token) {
                out.extend(idxs.iter().copied());
            }
        }
        out
    }

    /// Scores a single candidate string against the index, returning the
    /// best-scoring variant (if any) that clears `MIN_ACCEPT`.
    fn score_candidate(&self, candidate: &str) -> Option<(usize, f64)> {
        let normalized = normalize_company_name(candidate);
        if normalized.is_empty() {
            return None;
        }
        let tokens = tokenize(&normalized);

        if let Some(idxs) = self.exact_index.get(&normalized) {
            // All exact matches score 1.0; tie-break happens at the caller.
            return idxs
                .iter()
                .copied()
                .max_by_key(|&i| self.variants[i].source.rank())
                .map(|i| (i, 1.0));
        }

        let single_token_candidate = tokens.len() == 1;
        let mut best: Option<(usize, f64)> = None;

        for idx in self.shortlist(&tokens) {
            let variant = &self.variants[idx];
            let shared = tokens.intersection(&variant.tokens).count();
            if shared == 0 {
                continue;
            }
            let min_len = tokens.len().min(variant.tokens.len()).max(1);
            let union_len = tokens.union(&variant.tokens).count().max(1);
            let containment = shared as f64 / min_len as f64;
            let jaccard = shared as f64 / union_len as f64;

            let char_a = normalized.chars().count();
            let char_b = variant.normalized.chars().count();
            let max_chars = char_a.max(char_b).max(1);
            let distance = strsim::levenshtein(&normalized, &variant.normalized);
            let edit_similarity = 1.0 - (distance as f64 / max_chars as f64);

            let mut score = 0.5 * containment + 0.2 * jaccard + 0.3 * edit_similarity;

            let single_token_variant = variant.tokens.len() == 1;
            if single_token_candidate && single_token_variant {
                // Single-token trap: equality is already covered by the
                // exact-match branch above, so two distinct single tokens
                // never get boosted — prevents low-signal false positives
                // like "Co" vs "Go".
            } else {
                let padded_a = format!(" {normalized} ");
                let padded_b = format!(" {} ", variant.normalized);
                let shorter_len = char_a.min(char_b);
                if shorter_len >= 4 && (padded_a.contains(&padded_b) || padded_b.contains(&padded_a))
                {
                    score = score.max(0.91);
                }
                if containment >= 1.0 && min_len >= 2 && edit_similarity >= 0.8 {
                    score = score.max(0.90);
                }
            }

            let better = match best {
                None => true,
                Some((_, best_score)) => {
                    score > best_score
                        || (score == best_score
                            && variant.source.rank() > self.variants[best.unwrap().0].source.rank())
                }
            };
            if better {
                best = Some((idx, score));
            }
        }

        best.filter(|(_, score)| *score >= MIN_ACCEPT)
    }
}

/// Which office field produced the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchedField {
    Name,
    Brand,
    Operator,
}

/// Result of matching an office against the company index.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MatchResult {
    pub company_id: i64,
    pub company_name: String,
    pub matched_field: MatchedField,
    pub matched_variant: String,
    pub source: VariantSource,
    pub score: f64,
}

/// Tries to match a single office against the company index. Builds up to
/// three candidate strings (`name`, `brand`, `operator`), scores each, and
/// returns the best across all candidates.
pub fn match_office(index: &CompanyIndex, office: &CandidateOffice) -> Option<MatchResult> {
    let candidates: [(MatchedField, Option<&str>); 3] = [
        (MatchedField::Name, Some(office.name.as_str())),
        (MatchedField::Brand, office.brand.as_deref()),
        (MatchedField::Operator, office.operator.as_deref()),
    ];

    let mut seen_normalized: HashSet<String> = HashSet::new();
    let mut best: Option<MatchResult> = None;

    for (field, raw) in candidates {
        let Some(raw) = raw else { continue };
        let normalized = normalize_company_name(raw);
        if normalized.is_empty() || !seen_normalized.insert(normalized) {
            continue;
        }

        let Some((variant_idx, score)) = index.score_candidate(raw) else {
            continue;
        };
        let variant = &index.variants[variant_idx];

        let candidate_result = MatchResult {
            company_id: variant.company_id,
            company_name: variant.company_name.clone(),
            matched_field: field,
            matched_variant: variant.raw.clone(),
            source: variant.source,
            score,
        };

        best = Some(match best {
            None => candidate_result,
            Some(current) => {
                if candidate_result.score > current.score
                    || (candidate_result.score == current.score
                        && candidate_result.source.rank() > current.source.rank())
                {
                    candidate_result
                } else {
                    current
                }
            }
        });
    }

    best
}

/// Outcome of `filter_offices_with_known_companies`.
pub struct FilterOutcome {
    pub matched: Vec<(CandidateOffice, MatchResult)>,
    pub matched_count: usize,
    pub filtered_out_count: usize,
}

/// Runs the matcher over every office, keeping only those that matched a
/// known company.
pub fn filter_offices_with_known_companies(
    index: &CompanyIndex,
    offices: Vec<CandidateOffice>,
) -> FilterOutcome {
    let mut matched = Vec::new();
    let mut filtered_out_count = 0;

    for office in offices {
        match match_office(index, &office) {
            Some(result) => matched.push((office, result)),
            None => filtered_out_count += 1,
        }
    }

    let matched_count = matched.len();
    FilterOutcome {
        matched,
        matched_count,
        filtered_out_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company(id: i64, name: &str, aliases: Option<&str>) -> Company {
        Company {
            id,
            company_name: name.to_owned(),
            company_name_normalized: normalize_company_name(name),
            known_aliases: aliases.map(str::to_owned),
            hq_country: None,
            description: None,
            company_type: None,
            geography: None,
            industry: None,
            suitability_tier: None,
        }
    }

    fn office(name: &str) -> CandidateOffice {
        CandidateOffice {
            osm_type: crate::models::OsmType::Node,
            osm_id: 1,
            name: name.to_owned(),
            brand: None,
            operator: None,
            website: None,
            wikidata: None,
            wikidata_entity_id: None,
            lat: 0.0,
            lon: 0.0,
            low_confidence: false,
            tags_json: None,
        }
    }

    #[test]
    fn normalizes_suffixes_and_stopwords() {
        assert_eq!(normalize_company_name("Acme, Inc."), "acme");
        assert_eq!(normalize_company_name("The Bank of America"), "bank america");
        // "&" is spelled out to "and" before stopword removal, and "and"
        // is itself a low-signal stopword, so it drops out again.
        assert_eq!(normalize_company_name("Müller & Cie"), "muller cie");
    }

    #[test]
    fn exact_alias_match_scores_one() {
        let companies = vec![company(1, "Acme", Some("Acme Corp|Acme Ltd"))];
        let index = CompanyIndex::build(&companies);
        let result = match_office(&index, &office("Acme Corp")).expect("match");
        assert_eq!(result.company_id, 1);
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn phrase_containment_boosts_google_llc() {
        let companies = vec![company(1, "Google", None)];
        let index = CompanyIndex::build(&companies);
        let result = match_office(&index, &office("Google LLC")).expect("match");
        assert!(result.score >= 0.91, "score was {}", result.score);
    }

    #[test]
    fn phrase_containment_rescues_below_threshold_score() {
        let companies = vec![company(1, "Google", None)];
        let index = CompanyIndex::build(&companies);
        // "Google Ireland Limited" normalizes to "google ireland" — its raw
        // weighted score alone (~0.73) misses MIN_ACCEPT; the phrase
        // containment boost (whole-token "google" substring, len >= 4)
        // pushes it to 0.91.
        let result = match_office(&index, &office("Google Ireland Limited")).expect("match");
        assert!(result.score >= 0.91, "score was {}", result.score);
    }

    #[test]
    fn googly_does_not_match_google() {
        let companies = vec![company(1, "Google", None)];
        let index = CompanyIndex::build(&companies);
        assert!(match_office(&index, &office("Googly")).is_none());
    }

    #[test]
    fn unrelated_name_has_no_match() {
        let companies = vec![company(1, "Acme", None)];
        let index = CompanyIndex::build(&companies);
        assert!(match_office(&index, &office("Zeta Holdings")).is_none());
    }

    #[test]
    fn single_token_trap_rejects_distinct_single_tokens() {
        let companies = vec![company(1, "Go", None)];
        let index = CompanyIndex::build(&companies);
        assert!(match_office(&index, &office("Co")).is_none());
    }
}
