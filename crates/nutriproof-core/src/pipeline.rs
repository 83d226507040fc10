use std::sync::Arc;

use chrono::{Datelike, Utc};
use nutriproof_schema::{
    AggregatedResearch, EvidenceItem, EvidenceType, IngredientResearch, PaperRecord,
    QuickResearch, WebRecord,
};
use nutriproof_sources::{
    build_queries, PubMedAdapter, PubMedArticle, S2Paper, SearchOutcome, SearchScope,
    SemanticScholarAdapter, SourceAdapter, WebSearchAdapter, WebSearchResult,
};

use crate::config::{LimitsConfig, SourcesConfig};
use crate::normalize::{from_pubmed, from_semantic_scholar, from_web};
use crate::ranking::{dedupe_by_url, sort_by_relevance};
use crate::summary::derive_summary;
use crate::synthesis::fallback_recommendation;

pub type LiteratureSource = Arc<dyn SourceAdapter<Record = PubMedArticle>>;
pub type CitationGraphSource = Arc<dyn SourceAdapter<Record = S2Paper>>;
pub type WebSource = Arc<dyn SourceAdapter<Record = WebSearchResult>>;

/// The four adapter slots, in evidence priority order.
#[derive(Clone)]
pub struct Sources {
    pub literature: LiteratureSource,
    pub citation_graph: CitationGraphSource,
    pub web: WebSource,
    pub regulatory: WebSource,
}

impl Sources {
    pub fn from_config(config: &SourcesConfig) -> Self {
        Self {
            literature: Arc::new(PubMedAdapter::new(config.pubmed.clone())),
            citation_graph: Arc::new(SemanticScholarAdapter::new(
                config.semantic_scholar.clone(),
            )),
            web: Arc::new(WebSearchAdapter::new(config.exa.clone(), SearchScope::Health)),
            regulatory: Arc::new(WebSearchAdapter::new(
                config.exa.clone(),
                SearchScope::Regulatory,
            )),
        }
    }
}

/// Fans one ingredient out to every source and folds the answers into
/// ranked, deduplicated evidence.
pub struct ResearchPipeline {
    sources: Sources,
    limits: LimitsConfig,
}

impl ResearchPipeline {
    pub fn new(sources: Sources, limits: LimitsConfig) -> Self {
        Self { sources, limits }
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    /// Full aggregation over all four sources. Cannot fail: a source that
    /// errors contributes nothing.
    pub async fn research_ingredient(&self, ingredient: &str) -> IngredientResearch {
        let ingredient = ingredient.trim();
        let queries = build_queries(ingredient);
        let now = Utc::now();
        tracing::info!(ingredient, "researching ingredient");

        let (literature, citation_graph, web, regulatory) = tokio::join!(
            self.sources
                .literature
                .search(&queries.literature, self.limits.literature),
            self.sources
                .citation_graph
                .search(&queries.citation_graph, self.limits.citation_graph),
            self.sources.web.search(&queries.web, self.limits.web),
            self.sources
                .regulatory
                .search(&queries.regulatory, self.limits.regulatory),
        );

        let ranked = sort_by_relevance(&citation_graph.items, now.year());
        let health_hits = &web.items[..web.items.len().min(self.limits.web_evidence)];

        let mut evidence = literature_evidence(&literature.items, &ranked);
        evidence.extend(health_hits.iter().filter_map(|r| from_web(r, EvidenceType::Web)));
        evidence.extend(
            regulatory
                .items
                .iter()
                .filter_map(|r| from_web(r, EvidenceType::Regulatory)),
        );
        let evidence = dedupe_by_url(evidence);
        let summary = derive_summary(&evidence);

        let mut aggregated = aggregate_papers(&literature, &citation_graph, &ranked);
        aggregated.web_results = health_hits
            .iter()
            .chain(regulatory.items.iter())
            .map(web_record)
            .collect();

        tracing::info!(
            ingredient,
            evidence = evidence.len(),
            studies = summary.total_studies,
            rating = %summary.safety_rating,
            "research complete"
        );

        IngredientResearch {
            ingredient: ingredient.to_string(),
            evidence,
            summary,
            aggregated,
            last_updated: now,
        }
    }

    /// Literature-only fast path: smaller result counts, no web search and
    /// no remote synthesis.
    pub async fn quick_research(&self, ingredient: &str) -> QuickResearch {
        let ingredient = ingredient.trim();
        let queries = build_queries(ingredient);
        let now = Utc::now();
        tracing::debug!(ingredient, "quick research");

        let (literature, citation_graph) = tokio::join!(
            self.sources
                .literature
                .search(&queries.literature, self.limits.quick),
            self.sources
                .citation_graph
                .search(&queries.citation_graph, self.limits.quick),
        );

        let ranked = sort_by_relevance(&citation_graph.items, now.year());
        let evidence = dedupe_by_url(literature_evidence(&literature.items, &ranked));
        let summary = derive_summary(&evidence);
        let aggregated = aggregate_papers(&literature, &citation_graph, &ranked);
        let recommendation = fallback_recommendation(ingredient, &aggregated);

        QuickResearch {
            ingredient: ingredient.to_string(),
            evidence,
            summary,
            recommendation,
            aggregated,
            last_updated: now,
        }
    }
}

fn literature_evidence(articles: &[PubMedArticle], ranked: &[S2Paper]) -> Vec<EvidenceItem> {
    articles
        .iter()
        .map(from_pubmed)
        .chain(ranked.iter().map(from_semantic_scholar))
        .collect()
}

/// Paper records come from the raw records, before normalization trims them.
fn aggregate_papers(
    literature: &SearchOutcome<PubMedArticle>,
    citation_graph: &SearchOutcome<S2Paper>,
    ranked: &[S2Paper],
) -> AggregatedResearch {
    let papers = literature
        .items
        .iter()
        .map(|a| PaperRecord {
            title: a.title.clone(),
            abstract_text: Some(a.abstract_text.clone()).filter(|t| !t.is_empty()),
            tldr: None,
            pmid: Some(a.pmid.clone()),
            doi: None,
            citation_count: None,
            year: a.year,
        })
        .chain(ranked.iter().map(|p| PaperRecord {
            title: p.title.clone(),
            abstract_text: p.abstract_text.clone(),
            tldr: p.tldr.clone(),
            pmid: None,
            doi: p.external_ids.doi.clone(),
            citation_count: Some(p.citation_count),
            year: p.year,
        }))
        .collect();

    AggregatedResearch {
        papers,
        web_results: Vec::new(),
        total_results: literature.total_count + citation_graph.total_count,
    }
}

fn web_record(result: &WebSearchResult) -> WebRecord {
    WebRecord {
        title: result.title.clone(),
        snippet: result.snippet.clone(),
        url: result.url.clone(),
    }
}
