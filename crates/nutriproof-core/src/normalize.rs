//! Maps each source's native record into the canonical [`EvidenceItem`].

use nutriproof_schema::{Confidence, EvidenceItem, EvidenceType};
use nutriproof_sources::{PubMedArticle, S2Paper, WebSearchResult};
use url::Url;

pub const SUMMARY_MAX_CHARS: usize = 500;
pub const MAX_EVIDENCE_AUTHORS: usize = 5;

const MAX_MESH_TAGS: usize = 5;
const MAX_KEYWORD_TAGS: usize = 3;
const MAX_FIELD_TAGS: usize = 5;
const HIGH_CITATIONS: u64 = 100;
const MEDIUM_CITATIONS: u64 = 10;
const NO_SUMMARY: &str = "No summary available";

/// Intergovernmental health domains treated as official next to `.gov` hosts.
const OFFICIAL_DOMAINS: &[&str] = &["who.int", "efsa.europa.eu"];

pub fn from_pubmed(article: &PubMedArticle) -> EvidenceItem {
    let tags = article
        .mesh_terms
        .iter()
        .take(MAX_MESH_TAGS)
        .chain(article.keywords.iter().take(MAX_KEYWORD_TAGS))
        .cloned()
        .collect();

    EvidenceItem {
        id: format!("pubmed-{}", article.pmid),
        evidence_type: EvidenceType::Literature,
        title: article.title.clone(),
        summary: truncate_summary(&article.abstract_text),
        source: non_empty_or(&article.journal, "PubMed"),
        url: format!("https://pubmed.ncbi.nlm.nih.gov/{}/", article.pmid),
        year: article.year,
        citations: None,
        authors: author_list(&article.authors),
        confidence: Confidence::High,
        tags,
    }
}

pub fn from_semantic_scholar(paper: &S2Paper) -> EvidenceItem {
    let summary = paper
        .tldr
        .as_deref()
        .or(paper.abstract_text.as_deref())
        .map(truncate_summary)
        .unwrap_or_else(|| NO_SUMMARY.to_string());

    EvidenceItem {
        id: format!("s2-{}", paper.paper_id),
        evidence_type: EvidenceType::CitationGraph,
        title: paper.title.clone(),
        summary,
        source: non_empty_or(paper.venue.as_deref().unwrap_or_default(), "Semantic Scholar"),
        url: paper.url.clone(),
        year: paper.year,
        citations: Some(paper.citation_count),
        authors: author_list(&paper.authors),
        confidence: citation_confidence(paper.citation_count),
        tags: paper
            .fields_of_study
            .iter()
            .take(MAX_FIELD_TAGS)
            .cloned()
            .collect(),
    }
}

/// Returns `None` for hits whose URL cannot be parsed or has no host.
pub fn from_web(result: &WebSearchResult, evidence_type: EvidenceType) -> Option<EvidenceItem> {
    let parsed = Url::parse(result.url.trim()).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();

    let tags = match evidence_type {
        EvidenceType::Regulatory => vec!["regulatory".to_string(), "official".to_string()],
        _ => vec!["web".to_string()],
    };
    let confidence = if is_official_host(&host) {
        Confidence::High
    } else {
        Confidence::Medium
    };

    Some(EvidenceItem {
        id: format!("web-{}", hash_url(&result.url)),
        evidence_type,
        title: result.title.clone(),
        summary: truncate_summary(&result.snippet),
        source: host.strip_prefix("www.").unwrap_or(&host).to_string(),
        url: result.url.clone(),
        year: None,
        citations: None,
        authors: None,
        confidence,
        tags,
    })
}

pub fn citation_confidence(citations: u64) -> Confidence {
    if citations > HIGH_CITATIONS {
        Confidence::High
    } else if citations > MEDIUM_CITATIONS {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Government hosts (any `gov` label) and the named international domains.
pub fn is_official_host(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    host.split('.').any(|label| label == "gov")
        || OFFICIAL_DOMAINS
            .iter()
            .any(|domain| host_matches(&host, domain))
}

/// True when `host` is `domain` or one of its subdomains.
pub fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Cuts `text` to [`SUMMARY_MAX_CHARS`] characters, marking the cut with `...`.
pub fn truncate_summary(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(SUMMARY_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// 32-bit rolling hash (`h * 31 + unit` over UTF-16 units), rendered in base 36.
pub fn hash_url(url: &str) -> String {
    let hash = url
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)));
    to_base36(hash.unsigned_abs())
}

fn to_base36(mut value: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn author_list(authors: &[String]) -> Option<Vec<String>> {
    if authors.is_empty() {
        return None;
    }
    Some(authors.iter().take(MAX_EVIDENCE_AUTHORS).cloned().collect())
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
