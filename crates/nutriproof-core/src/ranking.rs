use std::collections::HashSet;

use nutriproof_schema::EvidenceItem;
use nutriproof_sources::S2Paper;

const RECENT_YEARS: i32 = 5;
const RECENCY_BONUS: f64 = 20.0;
const TLDR_BONUS: f64 = 10.0;

/// Ordering score for citation-graph papers; never shown to users.
pub fn relevance_score(paper: &S2Paper, current_year: i32) -> f64 {
    let citations = (paper.citation_count as f64 + 1.0).ln() * 10.0;
    let recency = match paper.year {
        Some(year) if current_year - year < RECENT_YEARS => RECENCY_BONUS,
        _ => 0.0,
    };
    let tldr = if paper.tldr.is_some() { TLDR_BONUS } else { 0.0 };
    citations + recency + tldr
}

/// Highest score first; equal scores keep their input order.
pub fn sort_by_relevance(papers: &[S2Paper], current_year: i32) -> Vec<S2Paper> {
    let mut scored: Vec<(f64, &S2Paper)> = papers
        .iter()
        .map(|p| (relevance_score(p, current_year), p))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, p)| p.clone()).collect()
}

/// Drops items whose URL (compared case-insensitively) was already seen.
pub fn dedupe_by_url(items: Vec<EvidenceItem>) -> Vec<EvidenceItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.url.to_lowercase()))
        .collect()
}
