use std::sync::Arc;

use nutriproof_core::{ProductService, Synthesizer};
use nutriproof_provider::AnthropicProvider;
use nutriproof_schema::{AggregatedResearch, Confidence, PaperRecord, SafetyLevel};
use nutriproof_sources::{OpenFoodFactsClient, OpenFoodFactsConfig};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn research() -> AggregatedResearch {
    AggregatedResearch {
        papers: vec![
            PaperRecord {
                title: "Aspartame intake and metabolic markers".into(),
                abstract_text: Some("No change in fasting glucose.".into()),
                pmid: Some("3210".into()),
                ..Default::default()
            },
            PaperRecord {
                title: "Non-nutritive sweeteners review".into(),
                doi: Some("10.9/nns".into()),
                citation_count: Some(250),
                ..Default::default()
            },
        ],
        web_results: vec![],
        total_results: 2,
    }
}

fn synthesizer(server: &MockServer) -> Synthesizer {
    let provider = AnthropicProvider::new("test-key", server.uri());
    Synthesizer::new(Some(Arc::new(provider)), "claude-test", 1024)
}

#[tokio::test]
async fn synthesis_parses_json_wrapped_in_prose() {
    let server = MockServer::start().await;

    let reply = "Here is my assessment:\n{\"summary\": \"Likely fine in normal amounts.\", \
                 \"safetyLevel\": \"safe\", \"keyPoints\": [\"No glucose effect\"], \
                 \"benefits\": [\"Zero calories\"], \"confidence\": \"medium\", \
                 \"citations\": [\"PMID:0000\"]}\nLet me know if you need more.";

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(serde_json::json!({
            "model": "claude-test",
            "max_tokens": 1024
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [{"type": "text", "text": reply}],
            "usage": {"input_tokens": 500, "output_tokens": 80},
            "stop_reason": "end_turn"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let rec = synthesizer(&server)
        .synthesize("aspartame", &research())
        .await;

    assert_eq!(rec.summary, "Likely fine in normal amounts.");
    assert_eq!(rec.safety_level, SafetyLevel::Safe);
    assert_eq!(rec.key_points, vec!["No glucose effect"]);
    assert_eq!(rec.benefits, vec!["Zero calories"]);
    assert!(rec.concerns.is_empty());
    assert_eq!(rec.confidence, Confidence::Medium);
    assert_eq!(rec.citations, vec!["PMID:3210", "DOI:10.9/nns"]);
}

#[tokio::test]
async fn synthesis_server_error_falls_back() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_json(serde_json::json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "overloaded"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let rec = synthesizer(&server)
        .synthesize("aspartame", &research())
        .await;

    assert_eq!(rec.summary, "Limited research found on aspartame (2 studies).");
    assert_eq!(rec.safety_level, SafetyLevel::InsufficientData);
    assert_eq!(rec.confidence, Confidence::Low);
    assert_eq!(
        rec.key_points,
        vec![
            "Aspartame intake and metabolic markers",
            "Non-nutritive sweeteners review"
        ]
    );
}

#[tokio::test]
async fn synthesis_without_json_falls_back() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [{"type": "text", "text": "I cannot assess this ingredient."}],
            "stop_reason": "end_turn"
        })))
        .mount(&server)
        .await;

    let rec = synthesizer(&server)
        .synthesize("aspartame", &research())
        .await;
    assert_eq!(rec.safety_level, SafetyLevel::InsufficientData);
    assert_eq!(rec.citations, vec!["PMID:3210", "DOI:10.9/nns"]);
}

#[tokio::test]
async fn concurrent_product_lookups_share_one_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/product/737628064502.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({
                    "status": 1,
                    "product": {"code": "737628064502", "product_name": "Rice noodles"}
                }))
                .set_delay(std::time::Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let service = ProductService::new(OpenFoodFactsClient::new(OpenFoodFactsConfig {
        base_url: server.uri(),
        ..Default::default()
    }));

    let (a, b) = tokio::join!(
        service.lookup("737628064502"),
        service.lookup(" 737628064502 ")
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(Arc::ptr_eq(&a, &b));
    let product = a.as_ref().as_ref().unwrap();
    assert_eq!(product.name, "Rice noodles");
}

#[tokio::test]
async fn product_lookup_rejects_non_numeric_barcode() {
    let service = ProductService::new(OpenFoodFactsClient::new(OpenFoodFactsConfig::default()));
    assert!(service.lookup("abc123").await.is_err());
    assert!(service.lookup("").await.is_err());
}
