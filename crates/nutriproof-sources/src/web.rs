//! Exa neural web search, restricted to an allow-listed set of domains.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{absorb, ensure_success, http_client, SearchOutcome, SourceAdapter, SourceError};

const HEALTH_DOMAINS: &[&str] = &[
    "nih.gov",
    "ncbi.nlm.nih.gov",
    "pubmed.gov",
    "sciencedirect.com",
    "nature.com",
    "who.int",
    "fda.gov",
    "efsa.europa.eu",
    "healthline.com",
    "mayoclinic.org",
    "webmd.com",
    "examine.com",
];

const REGULATORY_DOMAINS: &[&str] = &[
    "fda.gov",
    "efsa.europa.eu",
    "who.int",
    "ec.europa.eu",
    "gov.uk",
];

const MAX_TEXT_CHARACTERS: u32 = 1000;
const HIGHLIGHT_SENTENCES: u32 = 3;

fn default_base_url() -> String {
    "https://api.exa.ai".to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExaConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Empty means web search is not configured.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExaConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Purpose of a web search call; selects the domain allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Health,
    Regulatory,
}

impl SearchScope {
    pub fn domains(self) -> &'static [&'static str] {
        match self {
            Self::Health => HEALTH_DOMAINS,
            Self::Regulatory => REGULATORY_DOMAINS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebSearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub published_date: Option<String>,
    pub author: Option<String>,
    pub score: Option<f64>,
    pub highlights: Vec<String>,
}

pub struct WebSearchAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    scope: SearchScope,
}

impl WebSearchAdapter {
    pub fn new(config: ExaConfig, scope: SearchScope) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: Some(config.api_key).filter(|k| !k.is_empty()),
            scope,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn to_request<'a>(&self, query: &'a str, max_results: usize) -> ExaRequest<'a> {
        ExaRequest {
            query,
            num_results: max_results,
            search_type: "neural",
            include_domains: self.scope.domains(),
            use_autoprompt: true,
            contents: ExaContents {
                text: ExaTextOptions {
                    max_characters: MAX_TEXT_CHARACTERS,
                },
                highlights: ExaHighlightOptions {
                    num_sentences: HIGHLIGHT_SENTENCES,
                },
            },
        }
    }

    async fn try_search(
        &self,
        api_key: &str,
        query: &str,
        max_results: usize,
    ) -> Result<SearchOutcome<WebSearchResult>, SourceError> {
        let resp = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("x-api-key", api_key)
            .json(&self.to_request(query, max_results))
            .send()
            .await?;
        let body: ExaResponse = ensure_success(resp)
            .await?
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        let results: Vec<WebSearchResult> = body
            .results
            .into_iter()
            .filter_map(WebSearchResult::from_raw)
            .collect();
        Ok(SearchOutcome::new(results.len() as u64, results))
    }
}

#[async_trait]
impl SourceAdapter for WebSearchAdapter {
    type Record = WebSearchResult;

    fn name(&self) -> &'static str {
        match self.scope {
            SearchScope::Health => "web",
            SearchScope::Regulatory => "regulatory",
        }
    }

    async fn search(&self, query: &str, max_results: usize) -> SearchOutcome<WebSearchResult> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!(source = self.name(), "exa api key not configured, skipping web search");
            return SearchOutcome::empty();
        };
        absorb(
            self.name(),
            query,
            self.try_search(api_key, query, max_results).await,
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaRequest<'a> {
    query: &'a str,
    num_results: usize,
    #[serde(rename = "type")]
    search_type: &'static str,
    include_domains: &'static [&'static str],
    use_autoprompt: bool,
    contents: ExaContents,
}

#[derive(Debug, Serialize)]
struct ExaContents {
    text: ExaTextOptions,
    highlights: ExaHighlightOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaTextOptions {
    max_characters: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaHighlightOptions {
    num_sentences: u32,
}

#[derive(Debug, Deserialize)]
struct ExaResponse {
    #[serde(default)]
    results: Vec<RawResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    highlights: Option<Vec<String>>,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

impl WebSearchResult {
    /// A hit without a URL cannot be cited and is dropped.
    fn from_raw(raw: RawResult) -> Option<Self> {
        let url = raw.url.filter(|u| !u.trim().is_empty())?;
        let highlights = raw.highlights.unwrap_or_default();
        let snippet = raw
            .text
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| highlights.join(" "));
        Some(Self {
            title: raw.title.unwrap_or_default(),
            url,
            snippet,
            published_date: raw.published_date,
            author: raw.author,
            score: raw.score,
            highlights,
        })
    }
}
