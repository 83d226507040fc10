//! Barcode lookup against the Open Food Facts product database.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use nutriproof_schema::Product;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{http_client, USER_AGENT};

static LANG_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}:").expect("valid regex"));

const UNKNOWN_PRODUCT: &str = "Unknown Product";

fn default_base_url() -> String {
    "https://world.openfoodfacts.org/api/v0".to_string()
}

fn default_user_agent() -> String {
    USER_AGENT.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenFoodFactsConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenFoodFactsConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

pub struct OpenFoodFactsClient {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
}

impl OpenFoodFactsClient {
    pub fn new(config: OpenFoodFactsConfig) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent,
        }
    }

    /// `Ok(None)` when the database does not know the barcode.
    pub async fn fetch_product(&self, barcode: &str) -> Result<Option<Product>> {
        let barcode = barcode.trim();
        let url = format!("{}/product/{barcode}.json", self.base_url);
        tracing::debug!(barcode, "fetching product");

        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .with_context(|| format!("product lookup request failed for {barcode}"))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("open food facts returned {status}: {body}");
        }

        let body: OffResponse = resp
            .json()
            .await
            .context("failed to parse open food facts response")?;

        match body.product {
            Some(product) if body.status == 1 => Ok(Some(product.into_product(barcode))),
            _ => {
                tracing::info!(barcode, "product not found");
                Ok(None)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct OffResponse {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    product: Option<OffProduct>,
}

#[derive(Debug, Default, Deserialize)]
struct OffProduct {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    product_name: Option<String>,
    #[serde(default)]
    brands: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    image_front_url: Option<String>,
    #[serde(default)]
    ingredients_text: Option<String>,
    #[serde(default)]
    ingredients: Option<Vec<OffIngredient>>,
    #[serde(default)]
    categories_tags: Option<Vec<String>>,
    #[serde(default)]
    allergens_tags: Option<Vec<String>>,
    #[serde(default)]
    additives_tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct OffIngredient {
    #[serde(default)]
    text: Option<String>,
}

impl OffProduct {
    fn into_product(self, barcode: &str) -> Product {
        let ingredients_text = self.ingredients_text.unwrap_or_default();
        let structured: Vec<String> = self
            .ingredients
            .unwrap_or_default()
            .into_iter()
            .filter_map(|i| i.text)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        let ingredients = if structured.is_empty() {
            split_ingredients(&ingredients_text)
        } else {
            structured
        };

        Product {
            barcode: non_empty(self.code).unwrap_or_else(|| barcode.to_string()),
            name: non_empty(self.product_name).unwrap_or_else(|| UNKNOWN_PRODUCT.to_string()),
            brand: non_empty(self.brands),
            image_url: non_empty(self.image_url).or_else(|| non_empty(self.image_front_url)),
            ingredients_text,
            ingredients,
            allergens: clean_tags(self.allergens_tags),
            additives: clean_tags(self.additives_tags),
            categories: clean_tags(self.categories_tags),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn split_ingredients(text: &str) -> Vec<String> {
    text.split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Strips the `en:`-style language prefix from taxonomy tags.
fn clean_tags(tags: Option<Vec<String>>) -> Vec<String> {
    tags.unwrap_or_default()
        .iter()
        .map(|t| LANG_PREFIX.replace(t, "").into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_lose_language_prefix() {
        let tags = Some(vec!["en:milk".to_string(), "e330".to_string()]);
        assert_eq!(clean_tags(tags), vec!["milk", "e330"]);
    }

    #[test]
    fn ingredients_fall_back_to_text_split() {
        let product = OffProduct {
            ingredients_text: Some("water, sugar; citric acid,  ".into()),
            ..Default::default()
        }
        .into_product("123");
        assert_eq!(product.ingredients, vec!["water", "sugar", "citric acid"]);
        assert_eq!(product.name, "Unknown Product");
        assert_eq!(product.barcode, "123");
    }

    #[test]
    fn structured_ingredients_win_over_text() {
        let raw: OffProduct = serde_json::from_value(serde_json::json!({
            "code": "5449000000996",
            "product_name": "Cola",
            "brands": "",
            "image_front_url": "https://img/front.jpg",
            "ingredients_text": "ignored, text",
            "ingredients": [{"id": "en:water", "text": "Water"}, {"id": "x", "text": " "}]
        }))
        .unwrap();
        let product = raw.into_product("5449000000996");
        assert_eq!(product.ingredients, vec!["Water"]);
        assert_eq!(product.brand, None);
        assert_eq!(product.image_url.as_deref(), Some("https://img/front.jpg"));
    }
}
