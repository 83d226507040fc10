//! Keyword-driven summary over a deduplicated evidence set.
//!
//! Matching is plain substring search over the lower-cased, space-joined
//! summaries: no stemming, no synonyms.

use nutriproof_schema::{Confidence, ControversyLevel, EvidenceItem, IngredientSummary, SafetyRating};
use url::Url;

use crate::normalize::host_matches;

pub const MAX_KEY_FINDINGS: usize = 5;
/// Only the leading high-confidence items are mined; short ones are not backfilled.
const FINDING_CANDIDATES: usize = 3;
const MIN_FINDING_SOURCE_CHARS: usize = 50;
const MIN_FINDING_CHARS: usize = 20;

const CONTROVERSY_KEYWORDS: &[&str] = &[
    "controversial",
    "debate",
    "conflicting",
    "disputed",
    "mixed results",
];
const AVOID_KEYWORDS: &[&str] = &["toxic", "harmful", "banned", "dangerous", "carcinogenic"];
const CAUTION_KEYWORDS: &[&str] = &["caution", "limit", "moderate", "excessive"];
const SAFE_KEYWORDS: &[&str] = &["safe", "approved", "generally recognized", "gras"];

const REGULATORS: &[(&str, &str)] = &[
    ("fda.gov", "FDA"),
    ("efsa.europa.eu", "EFSA"),
    ("who.int", "WHO"),
];

pub fn derive_summary(evidence: &[EvidenceItem]) -> IngredientSummary {
    let text = merged_text(evidence);
    let regulatory_status = regulators(evidence);
    let safety_rating = safety_rating(&text, !regulatory_status.is_empty());

    let controversy_level = if contains_any(&text, CONTROVERSY_KEYWORDS) {
        ControversyLevel::Medium
    } else {
        ControversyLevel::Low
    };

    IngredientSummary {
        safety_rating,
        controversy_level,
        regulatory_status,
        key_findings: key_findings(evidence),
        total_studies: evidence
            .iter()
            .filter(|e| e.evidence_type.is_study())
            .count(),
    }
}

/// Avoid outranks caution, which outranks safe, regardless of frequency.
pub fn safety_rating(lowercase_text: &str, has_regulators: bool) -> SafetyRating {
    if contains_any(lowercase_text, AVOID_KEYWORDS) {
        SafetyRating::Avoid
    } else if contains_any(lowercase_text, CAUTION_KEYWORDS) {
        SafetyRating::Caution
    } else if contains_any(lowercase_text, SAFE_KEYWORDS) {
        if has_regulators {
            SafetyRating::Safe
        } else {
            SafetyRating::GenerallySafe
        }
    } else {
        SafetyRating::Unknown
    }
}

fn merged_text(evidence: &[EvidenceItem]) -> String {
    evidence
        .iter()
        .map(|e| e.summary.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Regulator ids whose domains appear among evidence URLs of any type,
/// first-seen order.
fn regulators(evidence: &[EvidenceItem]) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for item in evidence {
        let Some(host) = Url::parse(&item.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        else {
            continue;
        };
        for (domain, regulator) in REGULATORS {
            if host_matches(&host, domain) && !found.iter().any(|r| r == regulator) {
                found.push((*regulator).to_string());
            }
        }
    }
    found
}

fn key_findings(evidence: &[EvidenceItem]) -> Vec<String> {
    evidence
        .iter()
        .filter(|e| e.confidence == Confidence::High)
        .take(FINDING_CANDIDATES)
        .filter(|e| e.summary.chars().count() > MIN_FINDING_SOURCE_CHARS)
        .filter_map(|e| {
            let sentence = e.summary.split(['.', '!', '?']).next()?.trim();
            (sentence.chars().count() > MIN_FINDING_CHARS).then(|| sentence.to_string())
        })
        .take(MAX_KEY_FINDINGS)
        .collect()
}
