use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which family of source produced an evidence item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    Literature,
    CitationGraph,
    Web,
    Regulatory,
}

impl EvidenceType {
    /// Literature-style items count as studies; web and regulatory hits do not.
    pub fn is_study(self) -> bool {
        matches!(self, Self::Literature | Self::CitationGraph)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown confidence: {other}")),
        }
    }
}

/// One normalized document contributing to an ingredient's research picture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceItem {
    /// Deterministic id: source prefix plus native id or URL hash.
    pub id: String,
    #[serde(rename = "type")]
    pub evidence_type: EvidenceType,
    pub title: String,
    pub summary: String,
    /// Human-readable venue or host.
    pub source: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    pub confidence: Confidence,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SafetyRating {
    Safe,
    GenerallySafe,
    Caution,
    Avoid,
    Unknown,
}

impl SafetyRating {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::GenerallySafe => "generally_safe",
            Self::Caution => "caution",
            Self::Avoid => "avoid",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SafetyRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControversyLevel {
    None,
    Low,
    Medium,
    High,
}

impl fmt::Display for ControversyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(label)
    }
}

/// Derived view over a deduplicated evidence set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngredientSummary {
    pub safety_rating: SafetyRating,
    pub controversy_level: ControversyLevel,
    /// Regulator identifiers, e.g. "FDA", in first-seen order.
    pub regulatory_status: Vec<String>,
    pub key_findings: Vec<String>,
    pub total_studies: usize,
}

/// Lightweight paper record handed to synthesis.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaperRecord {
    pub title: String,
    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tldr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

impl PaperRecord {
    /// Traceable identifier: `PMID:<id>` preferred over `DOI:<doi>`.
    pub fn citation_id(&self) -> Option<String> {
        if let Some(pmid) = self.pmid.as_deref().filter(|p| !p.is_empty()) {
            return Some(format!("PMID:{pmid}"));
        }
        self.doi
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(|doi| format!("DOI:{doi}"))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WebRecord {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// Synthesis-ready projection of the raw (pre-normalization) results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AggregatedResearch {
    pub papers: Vec<PaperRecord>,
    pub web_results: Vec<WebRecord>,
    /// Sum of the two literature-style sources' totals only.
    pub total_results: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngredientResearch {
    pub ingredient: String,
    pub evidence: Vec<EvidenceItem>,
    pub summary: IngredientSummary,
    pub aggregated: AggregatedResearch,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SafetyLevel {
    Safe,
    GenerallySafe,
    Caution,
    Avoid,
    Unknown,
    InsufficientData,
}

impl SafetyLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::GenerallySafe => "generally_safe",
            Self::Caution => "caution",
            Self::Avoid => "avoid",
            Self::Unknown => "unknown",
            Self::InsufficientData => "insufficient_data",
        }
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SafetyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "safe" => Ok(Self::Safe),
            "generally_safe" => Ok(Self::GenerallySafe),
            "caution" => Ok(Self::Caution),
            "avoid" => Ok(Self::Avoid),
            "unknown" => Ok(Self::Unknown),
            "insufficient_data" => Ok(Self::InsufficientData),
            other => Err(format!("unknown safety level: {other}")),
        }
    }
}

/// Structured verdict produced by the synthesis stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiRecommendation {
    pub summary: String,
    pub safety_level: SafetyLevel,
    pub key_points: Vec<String>,
    pub concerns: Vec<String>,
    pub benefits: Vec<String>,
    pub recommendation: String,
    /// `PMID:..` / `DOI:..` identifiers of fetched records.
    pub citations: Vec<String>,
    pub confidence: Confidence,
}

/// Full aggregation plus its recommendation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngredientReport {
    pub research: IngredientResearch,
    pub recommendation: AiRecommendation,
}

/// Result of the reduced-cost literature-only path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuickResearch {
    pub ingredient: String,
    pub evidence: Vec<EvidenceItem>,
    pub summary: IngredientSummary,
    pub recommendation: AiRecommendation,
    pub aggregated: AggregatedResearch,
    pub last_updated: DateTime<Utc>,
}

/// Scanned product as returned by the product database.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub barcode: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub ingredients_text: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub allergens: Vec<String>,
    #[serde(default)]
    pub additives: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlaggedIngredient {
    pub name: String,
    pub concern: String,
}

/// Product-level roll-up over the researched ingredients.
/// `overall_safety` is one of safe, caution or unknown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductSafety {
    pub overall_safety: SafetyRating,
    pub summary: String,
    pub flagged_ingredients: Vec<FlaggedIngredient>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evidence_type_serializes_snake_case() {
        let json = serde_json::to_string(&EvidenceType::CitationGraph).unwrap();
        assert_eq!(json, "\"citation_graph\"");
    }

    #[test]
    fn only_literature_types_are_studies() {
        assert!(EvidenceType::Literature.is_study());
        assert!(EvidenceType::CitationGraph.is_study());
        assert!(!EvidenceType::Web.is_study());
        assert!(!EvidenceType::Regulatory.is_study());
    }

    #[test]
    fn citation_id_prefers_pmid() {
        let paper = PaperRecord {
            pmid: Some("123".into()),
            doi: Some("10.1/x".into()),
            ..Default::default()
        };
        assert_eq!(paper.citation_id().as_deref(), Some("PMID:123"));

        let doi_only = PaperRecord {
            doi: Some("10.1/x".into()),
            ..Default::default()
        };
        assert_eq!(doi_only.citation_id().as_deref(), Some("DOI:10.1/x"));

        assert!(PaperRecord::default().citation_id().is_none());
    }

    #[test]
    fn safety_level_parses_known_values() {
        assert_eq!("avoid".parse::<SafetyLevel>(), Ok(SafetyLevel::Avoid));
        assert_eq!(
            " Insufficient_Data ".parse::<SafetyLevel>(),
            Ok(SafetyLevel::InsufficientData)
        );
        assert!("definitely-fine".parse::<SafetyLevel>().is_err());
    }

    #[test]
    fn recommendation_uses_camel_case_fields() {
        let rec = AiRecommendation {
            summary: "ok".into(),
            safety_level: SafetyLevel::Caution,
            key_points: vec![],
            concerns: vec![],
            benefits: vec![],
            recommendation: "limit intake".into(),
            citations: vec!["PMID:1".into()],
            confidence: Confidence::Medium,
        };
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value["safetyLevel"], "caution");
        assert_eq!(value["keyPoints"], serde_json::json!([]));
        assert_eq!(value["confidence"], "medium");
    }

    #[test]
    fn evidence_item_omits_absent_optionals() {
        let item = EvidenceItem {
            id: "web-abc".into(),
            evidence_type: EvidenceType::Web,
            title: "t".into(),
            summary: "s".into(),
            source: "example.org".into(),
            url: "https://example.org".into(),
            year: None,
            citations: None,
            authors: None,
            confidence: Confidence::Medium,
            tags: vec!["web".into()],
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "web");
        assert!(value.get("year").is_none());
        assert!(value.get("citations").is_none());
    }
}
