//! PubMed E-utilities adapter: `esearch` for ids, then `efetch` for details.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{absorb, ensure_success, http_client, SearchOutcome, SourceAdapter, SourceError};

const MAX_AUTHORS: usize = 5;

fn default_base_url() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string()
}

fn default_tool() -> String {
    "Nutriproof".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubMedConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_tool")]
    pub tool: String,
    /// Contact address NCBI asks callers to identify themselves with.
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PubMedConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            tool: default_tool(),
            email: String::new(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PubMedArticle {
    pub pmid: String,
    pub title: String,
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub journal: String,
    /// "Month Year" when a month is present, else just the year.
    pub pub_date: String,
    pub year: Option<i32>,
    pub doi: Option<String>,
    pub keywords: Vec<String>,
    pub mesh_terms: Vec<String>,
}

pub struct PubMedAdapter {
    client: reqwest::Client,
    config: PubMedConfig,
}

impl PubMedAdapter {
    pub fn new(config: PubMedConfig) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            config: PubMedConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
        }
    }

    fn common_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("db", "pubmed".to_string()), ("tool", self.config.tool.clone())];
        if !self.config.email.is_empty() {
            params.push(("email", self.config.email.clone()));
        }
        if !self.config.api_key.is_empty() {
            params.push(("api_key", self.config.api_key.clone()));
        }
        params
    }

    async fn search_ids(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<(u64, Vec<String>), SourceError> {
        let mut params = self.common_params();
        params.extend([
            ("term", query.to_string()),
            ("retmax", max_results.to_string()),
            ("retmode", "json".to_string()),
            ("sort", "relevance".to_string()),
        ]);

        let resp = self
            .client
            .get(format!("{}/esearch.fcgi", self.config.base_url))
            .query(&params)
            .send()
            .await?;
        let body: ESearchResponse = ensure_success(resp).await?.json().await?;

        let result = body.esearchresult.unwrap_or_default();
        let total = result
            .count
            .as_deref()
            .and_then(|c| c.trim().parse::<u64>().ok())
            .unwrap_or(0);
        Ok((total, result.idlist.unwrap_or_default()))
    }

    async fn fetch_details(&self, pmids: &[String]) -> Result<Vec<PubMedArticle>, SourceError> {
        let mut params = self.common_params();
        params.extend([
            ("id", pmids.join(",")),
            ("retmode", "xml".to_string()),
            ("rettype", "abstract".to_string()),
        ]);

        let resp = self
            .client
            .get(format!("{}/efetch.fcgi", self.config.base_url))
            .query(&params)
            .send()
            .await?;
        let xml = ensure_success(resp).await?.text().await?;
        Ok(parse_articles(&xml, pmids))
    }

    async fn try_search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<SearchOutcome<PubMedArticle>, SourceError> {
        let (total, pmids) = self.search_ids(query, max_results).await?;
        if pmids.is_empty() {
            tracing::debug!(query, "pubmed returned no ids, skipping efetch");
            return Ok(SearchOutcome::empty());
        }
        let articles = self.fetch_details(&pmids).await?;
        Ok(SearchOutcome::new(total, articles))
    }
}

#[async_trait]
impl SourceAdapter for PubMedAdapter {
    type Record = PubMedArticle;

    fn name(&self) -> &'static str {
        "pubmed"
    }

    async fn search(&self, query: &str, max_results: usize) -> SearchOutcome<PubMedArticle> {
        absorb(self.name(), query, self.try_search(query, max_results).await)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ESearchResponse {
    #[serde(default)]
    esearchresult: Option<ESearchResult>,
}

#[derive(Debug, Default, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    count: Option<String>,
    #[serde(default)]
    idlist: Option<Vec<String>>,
}

static ARTICLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<PubmedArticle\b[^>]*>(.*?)</PubmedArticle>").expect("valid article regex")
});
static PMID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<PMID\b[^>]*>\s*(\d+)\s*</PMID>").expect("valid pmid regex"));
static AUTHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<Author\b[^>]*>(.*?)</Author>").expect("valid author regex"));
static KEYWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Keyword\b[^>]*>([^<]+)</Keyword>").expect("valid keyword regex"));
static MESH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<DescriptorName\b[^>]*>([^<]+)</DescriptorName>").expect("valid mesh regex")
});
static DOI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<ArticleId\s+IdType="doi"\s*>([^<]+)</ArticleId>"#).expect("valid doi regex")
});
static ARTICLE_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| element_regex("ArticleTitle"));
static ABSTRACT_RE: LazyLock<Regex> = LazyLock::new(|| element_regex("AbstractText"));
static JOURNAL_RE: LazyLock<Regex> = LazyLock::new(|| element_regex("Title"));
static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| element_regex("Year"));
static MONTH_RE: LazyLock<Regex> = LazyLock::new(|| element_regex("Month"));
static LAST_NAME_RE: LazyLock<Regex> = LazyLock::new(|| element_regex("LastName"));
static FORE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| element_regex("ForeName"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
static SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Extracts articles from an efetch XML payload, ordered like `pmids`.
/// Ids with no matching `<PubmedArticle>` block are skipped.
pub fn parse_articles(xml: &str, pmids: &[String]) -> Vec<PubMedArticle> {
    let mut by_pmid: HashMap<String, PubMedArticle> = HashMap::new();
    for block in ARTICLE_RE.captures_iter(xml) {
        let body = &block[1];
        let Some(pmid) = PMID_RE.captures(body).map(|c| c[1].to_string()) else {
            continue;
        };
        by_pmid
            .entry(pmid.clone())
            .or_insert_with(|| parse_article(&pmid, body));
    }

    pmids
        .iter()
        .filter_map(|pmid| by_pmid.remove(pmid))
        .collect()
}

fn parse_article(pmid: &str, xml: &str) -> PubMedArticle {
    let title = first_tag(xml, &ARTICLE_TITLE_RE).unwrap_or_else(|| "Untitled".to_string());
    let abstract_text = all_tags(xml, &ABSTRACT_RE).join(" ");
    let journal = first_tag(xml, &JOURNAL_RE).unwrap_or_default();
    let year_text = first_tag(xml, &YEAR_RE).unwrap_or_default();
    let month = first_tag(xml, &MONTH_RE).unwrap_or_default();
    let pub_date = if month.is_empty() {
        year_text.clone()
    } else {
        format!("{month} {year_text}")
    };

    PubMedArticle {
        pmid: pmid.to_string(),
        title,
        abstract_text,
        authors: parse_authors(xml),
        journal,
        pub_date,
        year: year_text.parse().ok(),
        doi: DOI_RE.captures(xml).map(|c| c[1].trim().to_string()),
        keywords: KEYWORD_RE
            .captures_iter(xml)
            .map(|c| clean_text(&c[1]))
            .collect(),
        mesh_terms: MESH_RE
            .captures_iter(xml)
            .map(|c| clean_text(&c[1]))
            .collect(),
    }
}

fn parse_authors(xml: &str) -> Vec<String> {
    AUTHOR_RE
        .captures_iter(xml)
        .filter_map(|c| {
            let author = &c[1];
            let last = first_tag(author, &LAST_NAME_RE)?;
            let fore = first_tag(author, &FORE_NAME_RE).unwrap_or_default();
            Some(format!("{fore} {last}").trim().to_string())
        })
        .take(MAX_AUTHORS)
        .collect()
}

fn element_regex(tag: &str) -> Regex {
    Regex::new(&format!(r"(?s)<{tag}\b[^>]*>(.*?)</{tag}>")).expect("valid element regex")
}

fn first_tag(xml: &str, re: &Regex) -> Option<String> {
    re.captures(xml)
        .map(|c| clean_text(&c[1]))
        .filter(|text| !text.is_empty())
}

fn all_tags(xml: &str, re: &Regex) -> Vec<String> {
    re.captures_iter(xml)
        .map(|c| clean_text(&c[1]))
        .filter(|text| !text.is_empty())
        .collect()
}

/// Strips inline markup, decodes the common entities, collapses whitespace.
fn clean_text(raw: &str) -> String {
    let stripped = TAG_RE.replace_all(raw, "");
    let decoded = stripped
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    SPACE_RE.replace_all(decoded.trim(), " ").into_owned()
}
