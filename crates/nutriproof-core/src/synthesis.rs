//! Turns aggregated research into an [`AiRecommendation`].
//!
//! A remote text-generation call is attempted when a provider is
//! configured. Any failure along the way (transport, status, missing JSON)
//! degrades to [`fallback_recommendation`]; callers always get a value.

use std::sync::Arc;

use anyhow::Result;
use nutriproof_provider::{create_provider, CompletionRequest, LlmProvider};
use nutriproof_schema::{AggregatedResearch, AiRecommendation, Confidence, SafetyLevel};
use serde_json::Value;

use crate::config::SynthesisConfig;

const PROMPT_PAPERS: usize = 10;
const PROMPT_WEB_RESULTS: usize = 5;
const PROMPT_ABSTRACT_CHARS: usize = 200;
const RESPONSE_CITATIONS: usize = 10;
const FALLBACK_CITATIONS: usize = 5;
const FALLBACK_KEY_POINTS: usize = 3;
const ENOUGH_STUDIES: u64 = 5;

const DEFAULT_SUMMARY: &str = "Unable to generate summary";
const DEFAULT_RECOMMENDATION: &str = "Insufficient evidence for recommendation";
const FALLBACK_RECOMMENDATION: &str = "Review the scientific papers below and consult a \
     healthcare professional for personalized advice.";

pub struct Synthesizer {
    provider: Option<Arc<dyn LlmProvider>>,
    model: String,
    max_tokens: u32,
}

impl Synthesizer {
    pub fn new(
        provider: Option<Arc<dyn LlmProvider>>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens,
        }
    }

    /// Always answers with the rule-derived recommendation.
    pub fn disabled() -> Self {
        Self::new(None, String::new(), 0)
    }

    pub fn from_config(config: &SynthesisConfig) -> Result<Self> {
        let provider = match config.provider_config() {
            Some(provider_config) => Some(create_provider(&provider_config)?),
            None => {
                tracing::info!(
                    "no synthesis credential configured, using rule-based recommendations"
                );
                None
            }
        };
        Ok(Self::new(provider, config.model.clone(), config.max_tokens))
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn synthesize(
        &self,
        ingredient: &str,
        research: &AggregatedResearch,
    ) -> AiRecommendation {
        let Some(provider) = &self.provider else {
            return fallback_recommendation(ingredient, research);
        };

        let request = CompletionRequest::new(&self.model, build_prompt(ingredient, research))
            .with_max_tokens(self.max_tokens);
        match provider.complete(request).await {
            Ok(completion) => {
                if completion.is_truncated() {
                    tracing::warn!(
                        ingredient,
                        provider = provider.name(),
                        "synthesis output hit the token limit"
                    );
                }
                parse_response(&completion.text, research).unwrap_or_else(|| {
                    tracing::warn!(ingredient, "synthesis response had no usable JSON, using fallback");
                    fallback_recommendation(ingredient, research)
                })
            }
            Err(e) => {
                tracing::warn!(
                    ingredient,
                    provider = provider.name(),
                    retryable = e.is_retryable(),
                    "synthesis failed, using fallback: {e}"
                );
                fallback_recommendation(ingredient, research)
            }
        }
    }
}

pub fn build_prompt(ingredient: &str, research: &AggregatedResearch) -> String {
    let papers = &research.papers[..research.papers.len().min(PROMPT_PAPERS)];
    let paper_lines = papers
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let excerpt = p
                .tldr
                .clone()
                .or_else(|| {
                    p.abstract_text
                        .as_deref()
                        .filter(|a| !a.is_empty())
                        .map(|a| {
                            let head: String = a.chars().take(PROMPT_ABSTRACT_CHARS).collect();
                            format!("{head}...")
                        })
                })
                .unwrap_or_else(|| "No abstract".to_string());
            format!(
                "{}. \"{}\" ({} citations)\n   {}\n   Source: {}",
                i + 1,
                p.title,
                p.citation_count.unwrap_or(0),
                excerpt,
                p.citation_id().unwrap_or_else(|| "N/A".to_string())
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let web_lines = research
        .web_results
        .iter()
        .take(PROMPT_WEB_RESULTS)
        .map(|w| format!("- {}: {}", w.title, w.snippet))
        .collect::<Vec<_>>()
        .join("\n");
    let web_lines = if web_lines.is_empty() {
        "None available".to_string()
    } else {
        web_lines
    };

    format!(
        r#"You are a nutrition science expert. Analyze the following research about "{ingredient}" and provide a clear, evidence-based recommendation.

RESEARCH PAPERS ({total} found, showing top {shown}):
{paper_lines}

RECENT WEB FINDINGS:
{web_lines}

Based on this evidence, provide a recommendation in the following JSON format:
{{
  "summary": "One or two sentence verdict on this ingredient",
  "safetyLevel": "safe|caution|avoid|insufficient_data",
  "keyPoints": ["Main finding 1", "Main finding 2", "Main finding 3"],
  "concerns": ["Any warnings or concerns"],
  "benefits": ["Any potential benefits"],
  "recommendation": "Detailed 2-3 sentence recommendation for the average consumer",
  "confidence": "high|medium|low"
}}

RULES:
- Only state claims supported by the provided research
- Include specific citations (PMID/DOI) when making claims
- If evidence is conflicting, say so
- If evidence is insufficient, say "insufficient_data"
- Be practical and actionable
- No medical advice - recommend consulting professionals for health conditions

Return ONLY valid JSON, no other text."#,
        total = research.total_results,
        shown = papers.len(),
    )
}

/// Best-effort: the span from the first `{` to the last `}`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// `None` when no JSON object can be recovered from `text`. Missing or
/// malformed fields get safe defaults. Citations always come from
/// `research`, never from the generated text.
pub fn parse_response(text: &str, research: &AggregatedResearch) -> Option<AiRecommendation> {
    let json = extract_json_object(text)?;
    let Value::Object(fields) = serde_json::from_str::<Value>(json).ok()? else {
        return None;
    };

    let string = |key: &str, default: &str| {
        fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or_else(|| default.to_string())
    };
    let list = |key: &str| -> Vec<String> {
        fields
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    };

    Some(AiRecommendation {
        summary: string("summary", DEFAULT_SUMMARY),
        safety_level: fields
            .get("safetyLevel")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(SafetyLevel::InsufficientData),
        key_points: list("keyPoints"),
        concerns: list("concerns"),
        benefits: list("benefits"),
        recommendation: string("recommendation", DEFAULT_RECOMMENDATION),
        citations: research_citations(research, RESPONSE_CITATIONS),
        confidence: fields
            .get("confidence")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(Confidence::Low),
    })
}

/// Deterministic recommendation built from the research alone.
pub fn fallback_recommendation(
    ingredient: &str,
    research: &AggregatedResearch,
) -> AiRecommendation {
    let total = research.total_results;
    let summary = if total >= ENOUGH_STUDIES {
        format!("Found {total} studies on {ingredient}. Review the evidence below.")
    } else {
        format!("Limited research found on {ingredient} ({total} studies).")
    };

    AiRecommendation {
        summary,
        safety_level: SafetyLevel::InsufficientData,
        key_points: research
            .papers
            .iter()
            .take(FALLBACK_KEY_POINTS)
            .map(|p| p.title.clone())
            .collect(),
        concerns: Vec::new(),
        benefits: Vec::new(),
        recommendation: FALLBACK_RECOMMENDATION.to_string(),
        citations: research_citations(research, FALLBACK_CITATIONS),
        confidence: Confidence::Low,
    }
}

/// Identifiers of the first `limit` papers; papers with neither id are skipped.
pub fn research_citations(research: &AggregatedResearch, limit: usize) -> Vec<String> {
    research
        .papers
        .iter()
        .take(limit)
        .filter_map(|p| p.citation_id())
        .collect()
}

#[cfg(test)]
mod tests {
    use nutriproof_provider::StubProvider;
    use nutriproof_schema::{PaperRecord, WebRecord};

    use super::*;

    fn research() -> AggregatedResearch {
        AggregatedResearch {
            papers: vec![
                PaperRecord {
                    title: "Aspartame and cancer risk".into(),
                    abstract_text: Some("x".repeat(300)),
                    pmid: Some("111".into()),
                    ..Default::default()
                },
                PaperRecord {
                    title: "Sweeteners review".into(),
                    tldr: Some("No harm found.".into()),
                    doi: Some("10.1/abc".into()),
                    citation_count: Some(42),
                    ..Default::default()
                },
                PaperRecord {
                    title: "Unidentified".into(),
                    ..Default::default()
                },
            ],
            web_results: vec![WebRecord {
                title: "FDA page".into(),
                snippet: "Approved.".into(),
                url: "https://www.fda.gov/a".into(),
            }],
            total_results: 12,
        }
    }

    #[test]
    fn prompt_lists_papers_and_web_findings() {
        let prompt = build_prompt("aspartame", &research());
        assert!(prompt.contains("research about \"aspartame\""));
        assert!(prompt.contains("RESEARCH PAPERS (12 found, showing top 3):"));
        assert!(prompt.contains("1. \"Aspartame and cancer risk\" (0 citations)"));
        assert!(prompt.contains(&format!("   {}...", "x".repeat(200))));
        assert!(prompt.contains("Source: PMID:111"));
        assert!(prompt.contains("2. \"Sweeteners review\" (42 citations)\n   No harm found.\n   Source: DOI:10.1/abc"));
        assert!(prompt.contains("Source: N/A"));
        assert!(prompt.contains("- FDA page: Approved."));
        assert!(prompt.ends_with("Return ONLY valid JSON, no other text."));
    }

    #[test]
    fn prompt_without_web_results_says_none() {
        let prompt = build_prompt("msg", &AggregatedResearch::default());
        assert!(prompt.contains("RECENT WEB FINDINGS:\nNone available"));
    }

    #[test]
    fn extract_json_tolerates_surrounding_prose() {
        let text = "Sure! Here you go:\n{\"summary\": \"ok\", \"nested\": {\"a\": 1}}\nHope it helps.";
        assert_eq!(
            extract_json_object(text),
            Some("{\"summary\": \"ok\", \"nested\": {\"a\": 1}}")
        );
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn parse_fills_defaults_and_uses_research_citations() {
        let text = r#"{"summary": "Mostly fine.", "safetyLevel": "caution", "keyPoints": ["a", 3, "b"], "citations": ["PMID:fake"]}"#;
        let rec = parse_response(text, &research()).unwrap();
        assert_eq!(rec.summary, "Mostly fine.");
        assert_eq!(rec.safety_level, SafetyLevel::Caution);
        assert_eq!(rec.key_points, vec!["a", "b"]);
        assert!(rec.concerns.is_empty());
        assert_eq!(rec.recommendation, DEFAULT_RECOMMENDATION);
        assert_eq!(rec.confidence, Confidence::Low);
        assert_eq!(rec.citations, vec!["PMID:111", "DOI:10.1/abc"]);
    }

    #[test]
    fn parse_maps_unknown_safety_level_to_insufficient_data() {
        let rec = parse_response(r#"{"safetyLevel": "probably ok", "confidence": "HIGH"}"#, &research()).unwrap();
        assert_eq!(rec.safety_level, SafetyLevel::InsufficientData);
        assert_eq!(rec.confidence, Confidence::High);
        assert_eq!(rec.summary, DEFAULT_SUMMARY);
    }

    #[test]
    fn parse_rejects_non_json() {
        assert!(parse_response("I cannot help with that.", &research()).is_none());
        assert!(parse_response("{not json}", &research()).is_none());
    }

    #[test]
    fn fallback_depends_on_study_count() {
        let rec = fallback_recommendation("aspartame", &research());
        assert_eq!(rec.summary, "Found 12 studies on aspartame. Review the evidence below.");
        assert_eq!(rec.safety_level, SafetyLevel::InsufficientData);
        assert_eq!(rec.confidence, Confidence::Low);
        assert_eq!(rec.key_points.len(), 3);
        assert_eq!(rec.citations, vec!["PMID:111", "DOI:10.1/abc"]);

        let empty = fallback_recommendation("msg", &AggregatedResearch::default());
        assert_eq!(empty.summary, "Limited research found on msg (0 studies).");
        assert!(empty.key_points.is_empty());
        assert!(empty.citations.is_empty());
    }

    #[tokio::test]
    async fn disabled_synthesizer_returns_fallback() {
        let synthesizer = Synthesizer::disabled();
        assert!(!synthesizer.is_enabled());
        let rec = synthesizer.synthesize("aspartame", &research()).await;
        assert_eq!(rec, fallback_recommendation("aspartame", &research()));
    }

    #[tokio::test]
    async fn placeholder_enums_in_provider_output_get_defaults() {
        // The stub echoes the prompt, so the parsed object is the format template.
        let synthesizer = Synthesizer::new(Some(Arc::new(StubProvider)), "stub", 256);
        let rec = synthesizer.synthesize("aspartame", &research()).await;
        assert_eq!(rec.summary, "One or two sentence verdict on this ingredient");
        assert_eq!(rec.safety_level, SafetyLevel::InsufficientData);
        assert_eq!(rec.confidence, Confidence::Low);
        assert_eq!(rec.citations, vec!["PMID:111", "DOI:10.1/abc"]);
    }
}
