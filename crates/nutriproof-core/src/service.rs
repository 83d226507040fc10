use std::sync::Arc;

use anyhow::{ensure, Result};
use futures::future::join_all;
use nutriproof_schema::{IngredientReport, Product, ProductSafety, QuickResearch};
use nutriproof_sources::OpenFoodFactsClient;

use crate::config::NutriproofConfig;
use crate::inflight::{normalize_key, InFlight};
use crate::pipeline::{ResearchPipeline, Sources};
use crate::product::assess_product;
use crate::synthesis::Synthesizer;

/// Entry points for ingredient research. Concurrent calls for the same
/// ingredient share one aggregation.
pub struct ResearchService {
    pipeline: Arc<ResearchPipeline>,
    synthesizer: Arc<Synthesizer>,
    full: InFlight<IngredientReport>,
    quick: InFlight<QuickResearch>,
}

impl ResearchService {
    pub fn new(pipeline: ResearchPipeline, synthesizer: Synthesizer) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            synthesizer: Arc::new(synthesizer),
            full: InFlight::new(),
            quick: InFlight::new(),
        }
    }

    pub fn from_config(config: &NutriproofConfig) -> Result<Self> {
        let pipeline = ResearchPipeline::new(
            Sources::from_config(&config.sources),
            config.limits.clone(),
        );
        Ok(Self::new(pipeline, Synthesizer::from_config(&config.synthesis)?))
    }

    /// Full aggregation followed by synthesis.
    pub async fn research(&self, ingredient: &str) -> Result<Arc<IngredientReport>> {
        ensure!(!normalize_key(ingredient).is_empty(), "ingredient name is empty");
        let pipeline = Arc::clone(&self.pipeline);
        let synthesizer = Arc::clone(&self.synthesizer);
        let name = ingredient.trim().to_string();

        let report = self
            .full
            .run(ingredient, move || async move {
                let research = pipeline.research_ingredient(&name).await;
                let recommendation = synthesizer
                    .synthesize(&research.ingredient, &research.aggregated)
                    .await;
                Ok::<_, anyhow::Error>(IngredientReport {
                    research,
                    recommendation,
                })
            })
            .await?;
        Ok(report)
    }

    pub async fn quick(&self, ingredient: &str) -> Result<Arc<QuickResearch>> {
        ensure!(!normalize_key(ingredient).is_empty(), "ingredient name is empty");
        let pipeline = Arc::clone(&self.pipeline);
        let name = ingredient.trim().to_string();

        let quick = self
            .quick
            .run(ingredient, move || async move {
                Ok::<_, anyhow::Error>(pipeline.quick_research(&name).await)
            })
            .await?;
        Ok(quick)
    }

    /// Quick-researches up to `limits.assessed_ingredients` ingredients of
    /// `product` concurrently and rolls the results up.
    pub async fn assess_product(&self, product: &Product) -> ProductSafety {
        let limit = self.pipeline.limits().assessed_ingredients;
        let names: Vec<&String> = product
            .ingredients
            .iter()
            .filter(|name| !normalize_key(name).is_empty())
            .take(limit)
            .collect();

        let results = join_all(names.iter().map(|name| self.quick(name))).await;
        let researched: Vec<_> = names
            .into_iter()
            .zip(results)
            .filter_map(|(name, result)| match result {
                Ok(quick) => Some((name.clone(), quick.aggregated.clone())),
                Err(e) => {
                    tracing::warn!(ingredient = %name, "skipping ingredient: {e:#}");
                    None
                }
            })
            .collect();

        assess_product(&product.name, &researched)
    }
}

/// Barcode lookups; concurrent lookups of one barcode share a request.
pub struct ProductService {
    client: Arc<OpenFoodFactsClient>,
    inflight: InFlight<Option<Product>>,
}

impl ProductService {
    pub fn new(client: OpenFoodFactsClient) -> Self {
        Self {
            client: Arc::new(client),
            inflight: InFlight::new(),
        }
    }

    pub fn from_config(config: &NutriproofConfig) -> Self {
        Self::new(OpenFoodFactsClient::new(
            config.sources.open_food_facts.clone(),
        ))
    }

    /// `None` inside the `Arc` when the barcode is unknown.
    pub async fn lookup(&self, barcode: &str) -> Result<Arc<Option<Product>>> {
        let barcode = barcode.trim().to_string();
        ensure!(
            !barcode.is_empty() && barcode.chars().all(|c| c.is_ascii_digit()),
            "invalid barcode: {barcode:?}"
        );
        let client = Arc::clone(&self.client);
        let key = barcode.clone();

        let product = self
            .inflight
            .run(&key, move || async move { client.fetch_product(&barcode).await })
            .await?;
        Ok(product)
    }
}
