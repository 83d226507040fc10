use std::{fs, path::Path};

use anyhow::{anyhow, Context, Result};
use nutriproof_provider::{ProviderConfig, ProviderType};
use nutriproof_sources::{ExaConfig, OpenFoodFactsConfig, PubMedConfig, SemanticScholarConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub pubmed: PubMedConfig,
    #[serde(default)]
    pub semantic_scholar: SemanticScholarConfig,
    #[serde(default)]
    pub exa: ExaConfig,
    #[serde(default)]
    pub open_food_facts: OpenFoodFactsConfig,
}

fn default_literature_limit() -> usize {
    5
}

fn default_citation_graph_limit() -> usize {
    5
}

fn default_web_limit() -> usize {
    10
}

fn default_web_evidence_limit() -> usize {
    5
}

fn default_regulatory_limit() -> usize {
    5
}

fn default_quick_limit() -> usize {
    3
}

fn default_assessed_ingredients() -> usize {
    5
}

/// Per-source result counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_literature_limit")]
    pub literature: usize,
    #[serde(default = "default_citation_graph_limit")]
    pub citation_graph: usize,
    /// Health web hits requested from the search service.
    #[serde(default = "default_web_limit")]
    pub web: usize,
    /// Health web hits kept as evidence; a prefix of `web`.
    #[serde(default = "default_web_evidence_limit")]
    pub web_evidence: usize,
    #[serde(default = "default_regulatory_limit")]
    pub regulatory: usize,
    /// Per-source count on the quick path.
    #[serde(default = "default_quick_limit")]
    pub quick: usize,
    /// Ingredients researched when assessing a whole product.
    #[serde(default = "default_assessed_ingredients")]
    pub assessed_ingredients: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            literature: default_literature_limit(),
            citation_graph: default_citation_graph_limit(),
            web: default_web_limit(),
            web_evidence: default_web_evidence_limit(),
            regulatory: default_regulatory_limit(),
            quick: default_quick_limit(),
            assessed_ingredients: default_assessed_ingredients(),
        }
    }
}

fn default_synthesis_enabled() -> bool {
    true
}

fn default_provider_type() -> ProviderType {
    ProviderType::Anthropic
}

fn default_synthesis_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_synthesis_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    #[serde(default = "default_synthesis_enabled")]
    pub enabled: bool,
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_synthesis_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_synthesis_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            enabled: default_synthesis_enabled(),
            provider_type: default_provider_type(),
            api_key: String::new(),
            base_url: None,
            model: default_synthesis_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_synthesis_timeout_secs(),
        }
    }
}

impl SynthesisConfig {
    /// `None` when synthesis is disabled or its credential is missing;
    /// callers then use the rule-derived recommendation only.
    pub fn provider_config(&self) -> Option<ProviderConfig> {
        if !self.enabled {
            return None;
        }
        if self.provider_type.requires_api_key() && self.api_key.is_empty() {
            return None;
        }
        let mut config =
            ProviderConfig::new(self.provider_type).with_timeout_secs(self.timeout_secs);
        if !self.api_key.is_empty() {
            config = config.with_api_key(self.api_key.clone());
        }
        if let Some(url) = self.base_url.as_deref().filter(|u| !u.is_empty()) {
            config = config.with_base_url(url);
        }
        Some(config)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NutriproofConfig {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

/// Loads `main.yaml` from `config_dir`. A missing file yields the defaults.
pub fn load_config(config_dir: &Path) -> Result<NutriproofConfig> {
    let path = config_dir.join("main.yaml");
    let mut config: NutriproofConfig = if path.exists() {
        read_yaml_file(&path)?
    } else {
        tracing::debug!("no config file at {}, using defaults", path.display());
        NutriproofConfig::default()
    };

    resolve_config_env(&mut config);
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &NutriproofConfig) -> Result<()> {
    let limits = &config.limits;
    let named = [
        ("literature", limits.literature),
        ("citation_graph", limits.citation_graph),
        ("web", limits.web),
        ("web_evidence", limits.web_evidence),
        ("regulatory", limits.regulatory),
        ("quick", limits.quick),
        ("assessed_ingredients", limits.assessed_ingredients),
    ];
    for (name, value) in named {
        if value == 0 {
            return Err(anyhow!("limits.{name} must be greater than zero"));
        }
    }

    if limits.web_evidence > limits.web {
        return Err(anyhow!(
            "limits.web_evidence ({}) cannot exceed limits.web ({})",
            limits.web_evidence,
            limits.web
        ));
    }

    let synthesis = &config.synthesis;
    let has_base_url = synthesis
        .base_url
        .as_deref()
        .is_some_and(|u| !u.is_empty());
    if synthesis.enabled && synthesis.provider_type.requires_base_url() && !has_base_url {
        return Err(anyhow!(
            "synthesis provider {:?} requires base_url",
            synthesis.provider_type
        ));
    }

    if synthesis.max_tokens == 0 {
        return Err(anyhow!("synthesis.max_tokens must be greater than zero"));
    }

    Ok(())
}

fn read_yaml_file<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))
}

fn resolve_config_env(config: &mut NutriproofConfig) {
    let sources = &mut config.sources;
    sources.pubmed.base_url = resolve_env_var(&sources.pubmed.base_url);
    sources.pubmed.email = resolve_env_var(&sources.pubmed.email);
    sources.pubmed.api_key = resolve_env_var(&sources.pubmed.api_key);
    sources.semantic_scholar.base_url = resolve_env_var(&sources.semantic_scholar.base_url);
    sources.semantic_scholar.api_key = resolve_env_var(&sources.semantic_scholar.api_key);
    sources.exa.base_url = resolve_env_var(&sources.exa.base_url);
    sources.exa.api_key = resolve_env_var(&sources.exa.api_key);
    sources.open_food_facts.base_url = resolve_env_var(&sources.open_food_facts.base_url);
    sources.open_food_facts.user_agent = resolve_env_var(&sources.open_food_facts.user_agent);

    let synthesis = &mut config.synthesis;
    synthesis.api_key = resolve_env_var(&synthesis.api_key);
    synthesis.model = resolve_env_var(&synthesis.model);
    if let Some(url) = synthesis.base_url.as_mut() {
        *url = resolve_env_var(url);
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn fixture_config_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config")
    }

    #[test]
    fn load_config_from_workspace_fixtures() {
        let config = load_config(&fixture_config_root()).unwrap();
        assert_eq!(config.limits, LimitsConfig::default());
        assert_eq!(
            config.sources.pubmed.base_url,
            "https://eutils.ncbi.nlm.nih.gov/entrez/eutils"
        );
        assert_eq!(config.sources.semantic_scholar.cache_ttl_secs, 300);
        assert_eq!(config.sources.semantic_scholar.min_interval_ms, 1000);
        assert_eq!(config.synthesis.provider_type, ProviderType::Anthropic);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.limits.web, 10);
        assert_eq!(config.limits.quick, 3);
        assert_eq!(config.sources.exa.base_url, "https://api.exa.ai");
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("main.yaml"),
            "limits:\n  literature: 8\nsynthesis:\n  enabled: false\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.limits.literature, 8);
        assert_eq!(config.limits.citation_graph, 5);
        assert!(!config.synthesis.enabled);
        assert!(config.synthesis.provider_config().is_none());
    }

    #[test]
    fn malformed_yaml_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.yaml"), "limits: [not, a, map").unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("main.yaml"));
    }

    #[test]
    fn validate_rejects_zero_limit() {
        let mut config = NutriproofConfig::default();
        config.limits.regulatory = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("limits.regulatory"));
    }

    #[test]
    fn validate_rejects_web_evidence_above_web() {
        let mut config = NutriproofConfig::default();
        config.limits.web = 3;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("web_evidence"));
    }

    #[test]
    fn validate_rejects_custom_provider_without_base_url() {
        let mut config = NutriproofConfig::default();
        config.synthesis.provider_type = ProviderType::Custom;
        assert!(validate_config(&config).is_err());

        config.synthesis.base_url = Some("https://llm.internal/v1".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn provider_config_requires_key_for_remote_providers() {
        let mut synthesis = SynthesisConfig::default();
        assert!(synthesis.provider_config().is_none());

        synthesis.api_key = "sk-test".into();
        let provider = synthesis.provider_config().unwrap();
        assert_eq!(provider.provider_type, ProviderType::Anthropic);
        assert_eq!(provider.api_key.as_deref(), Some("sk-test"));
        assert_eq!(provider.timeout_secs, Some(30));

        let ollama = SynthesisConfig {
            provider_type: ProviderType::Ollama,
            ..SynthesisConfig::default()
        };
        assert!(ollama.provider_config().is_some());
    }

    #[test]
    fn resolve_env_var_returns_raw_when_not_placeholder() {
        assert_eq!(resolve_env_var("plain-value"), "plain-value");
    }

    #[test]
    fn resolve_env_var_unclosed_bracket() {
        assert_eq!(resolve_env_var("prefix_${UNCLOSED"), "prefix_${UNCLOSED");
    }

    #[test]
    fn resolve_env_var_missing_env_returns_empty() {
        let result = resolve_env_var("key=${NUTRIPROOF_NONEXISTENT_VAR_XYZ}");
        assert_eq!(result, "key=");
    }

    #[test]
    fn env_placeholders_resolve_in_loaded_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("main.yaml"),
            "sources:\n  exa:\n    api_key: \"${NUTRIPROOF_TEST_UNSET_EXA_KEY}\"\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert!(config.sources.exa.api_key.is_empty());
    }
}
