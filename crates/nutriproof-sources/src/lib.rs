pub mod openfoodfacts;
pub mod pubmed;
pub mod query;
pub mod semantic_scholar;
pub mod web;

use std::time::Duration;

use async_trait::async_trait;

pub use openfoodfacts::{OpenFoodFactsClient, OpenFoodFactsConfig};
pub use pubmed::{PubMedAdapter, PubMedArticle, PubMedConfig};
pub use query::{build_queries, SourceQueries};
pub use semantic_scholar::{S2Paper, SemanticScholarAdapter, SemanticScholarConfig};
pub use web::{ExaConfig, SearchScope, WebSearchAdapter, WebSearchResult};

pub(crate) const USER_AGENT: &str = concat!("Nutriproof/", env!("CARGO_PKG_VERSION"));

/// Normalized answer of one source: total hit count plus the fetched records.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome<R> {
    pub total_count: u64,
    pub items: Vec<R>,
}

impl<R> SearchOutcome<R> {
    pub fn new(total_count: u64, items: Vec<R>) -> Self {
        Self { total_count, items }
    }

    pub fn empty() -> Self {
        Self {
            total_count: 0,
            items: Vec::new(),
        }
    }
}

impl<R> Default for SearchOutcome<R> {
    fn default() -> Self {
        Self::empty()
    }
}

/// One external search capability.
///
/// `search` has no error arm: a failing source reports `{0, []}` so that
/// the aggregation around it always completes.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    type Record: Send + Sync;

    fn name(&self) -> &'static str;

    async fn search(&self, query: &str, max_results: usize) -> SearchOutcome<Self::Record>;
}

/// Failures inside an adapter. Never surfaced past `SourceAdapter::search`.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("malformed response: {0}")]
    Parse(String),
}

pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(timeout_secs, "http client setup failed, using reqwest defaults: {e}");
            reqwest::Client::new()
        })
}

pub(crate) async fn ensure_success(
    resp: reqwest::Response,
) -> Result<reqwest::Response, SourceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SourceError::Status { status, body })
}

/// Logs an adapter failure and substitutes the empty outcome.
pub(crate) fn absorb<R>(
    source: &'static str,
    query: &str,
    result: Result<SearchOutcome<R>, SourceError>,
) -> SearchOutcome<R> {
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(source, query, "search failed, contributing no evidence: {e}");
            SearchOutcome::empty()
        }
    }
}
