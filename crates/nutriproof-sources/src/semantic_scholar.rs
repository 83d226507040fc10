//! Semantic Scholar graph search.
//!
//! The public API enforces a fair-use limit, so the adapter owns a small
//! result cache keyed by `query:limit` and spaces outbound calls by a
//! minimum interval. Bursts queue behind the interval instead of failing.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::{absorb, ensure_success, http_client, SearchOutcome, SourceAdapter, SourceError};

const SEARCH_FIELDS: &str = "paperId,title,abstract,tldr,authors,year,citationCount,\
influentialCitationCount,venue,url,openAccessPdf,fieldsOfStudy,publicationTypes,externalIds";

fn default_base_url() -> String {
    "https://api.semanticscholar.org/graph/v1".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_min_interval_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticScholarConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Optional partner key; raises the rate limit when present.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SemanticScholarConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            cache_ttl_secs: default_cache_ttl_secs(),
            min_interval_ms: default_min_interval_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalIds {
    pub doi: Option<String>,
    pub pubmed: Option<String>,
    pub arxiv: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct S2Paper {
    pub paper_id: String,
    pub title: String,
    pub abstract_text: Option<String>,
    /// Short machine-generated summary.
    pub tldr: Option<String>,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub citation_count: u64,
    pub influential_citation_count: u64,
    pub venue: Option<String>,
    pub url: String,
    pub open_access_pdf: Option<String>,
    pub fields_of_study: Vec<String>,
    pub publication_types: Vec<String>,
    pub external_ids: ExternalIds,
}

struct CachedSearch {
    stored_at: Instant,
    outcome: SearchOutcome<S2Paper>,
}

pub struct SemanticScholarAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    cache_ttl: Duration,
    min_interval: Duration,
    cache: Mutex<HashMap<String, CachedSearch>>,
    last_call: Mutex<Option<Instant>>,
}

impl SemanticScholarAdapter {
    pub fn new(config: SemanticScholarConfig) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: Some(config.api_key).filter(|k| !k.is_empty()),
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
            min_interval: Duration::from_millis(config.min_interval_ms),
            cache: Mutex::new(HashMap::new()),
            last_call: Mutex::new(None),
        }
    }

    async fn cached(&self, key: &str) -> Option<SearchOutcome<S2Paper>> {
        let mut cache = self.cache.lock().await;
        match cache.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.cache_ttl => {
                Some(entry.outcome.clone())
            }
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    /// Waits until `min_interval` has passed since the previous outbound call.
    /// The lock is held across the sleep so concurrent callers line up.
    async fn throttle(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }

    async fn fetch(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<SearchOutcome<S2Paper>, SourceError> {
        let mut req = self
            .client
            .get(format!("{}/paper/search", self.base_url))
            .query(&[
                ("query", query.to_string()),
                ("limit", max_results.to_string()),
                ("fields", SEARCH_FIELDS.to_string()),
            ]);
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }

        let resp = ensure_success(req.send().await?).await?;
        let body: RawSearchResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        let papers: Vec<S2Paper> = body
            .data
            .unwrap_or_default()
            .into_iter()
            .filter_map(S2Paper::from_raw)
            .collect();
        let total = body.total.unwrap_or(papers.len() as u64);
        Ok(SearchOutcome::new(total, papers))
    }
}

#[async_trait]
impl SourceAdapter for SemanticScholarAdapter {
    type Record = S2Paper;

    fn name(&self) -> &'static str {
        "semantic_scholar"
    }

    async fn search(&self, query: &str, max_results: usize) -> SearchOutcome<S2Paper> {
        let key = format!("{query}:{max_results}");
        if let Some(hit) = self.cached(&key).await {
            tracing::debug!(query, "semantic scholar cache hit");
            return hit;
        }

        self.throttle().await;

        match self.fetch(query, max_results).await {
            Ok(outcome) => {
                self.cache.lock().await.insert(
                    key,
                    CachedSearch {
                        stored_at: Instant::now(),
                        outcome: outcome.clone(),
                    },
                );
                outcome
            }
            Err(e) => absorb(self.name(), query, Err(e)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSearchResponse {
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    data: Option<Vec<RawPaper>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPaper {
    #[serde(default)]
    paper_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    tldr: Option<RawTldr>,
    #[serde(default)]
    authors: Option<Vec<RawAuthor>>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    citation_count: Option<u64>,
    #[serde(default)]
    influential_citation_count: Option<u64>,
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    open_access_pdf: Option<RawPdf>,
    #[serde(default)]
    fields_of_study: Option<Vec<String>>,
    #[serde(default)]
    publication_types: Option<Vec<String>>,
    #[serde(default)]
    external_ids: Option<RawExternalIds>,
}

#[derive(Debug, Deserialize)]
struct RawTldr {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPdf {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawExternalIds {
    #[serde(default, rename = "DOI")]
    doi: Option<String>,
    #[serde(default, rename = "PubMed")]
    pubmed: Option<String>,
    #[serde(default, rename = "ArXiv")]
    arxiv: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl S2Paper {
    /// Records without a paper id cannot be cited or deduplicated and are dropped.
    fn from_raw(raw: RawPaper) -> Option<Self> {
        let paper_id = non_empty(raw.paper_id)?;
        let url = non_empty(raw.url)
            .unwrap_or_else(|| format!("https://www.semanticscholar.org/paper/{paper_id}"));
        let external_ids = raw.external_ids.unwrap_or_default();
        Some(Self {
            title: non_empty(raw.title).unwrap_or_else(|| "Untitled".to_string()),
            abstract_text: non_empty(raw.abstract_text),
            tldr: non_empty(raw.tldr.and_then(|t| t.text)),
            authors: raw
                .authors
                .unwrap_or_default()
                .into_iter()
                .filter_map(|a| non_empty(a.name))
                .collect(),
            year: raw.year,
            citation_count: raw.citation_count.unwrap_or(0),
            influential_citation_count: raw.influential_citation_count.unwrap_or(0),
            venue: non_empty(raw.venue),
            url,
            open_access_pdf: raw.open_access_pdf.and_then(|p| non_empty(p.url)),
            fields_of_study: raw.fields_of_study.unwrap_or_default(),
            publication_types: raw.publication_types.unwrap_or_default(),
            external_ids: ExternalIds {
                doi: non_empty(external_ids.doi),
                pubmed: non_empty(external_ids.pubmed),
                arxiv: non_empty(external_ids.arxiv),
            },
            paper_id,
        })
    }
}
