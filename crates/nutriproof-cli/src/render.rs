use std::fmt::Write;

use nutriproof_schema::{
    AiRecommendation, EvidenceItem, IngredientReport, IngredientSummary, Product, ProductSafety,
    QuickResearch,
};

const EVIDENCE_SHOWN: usize = 10;

pub fn report(report: &IngredientReport) -> String {
    let research = &report.research;
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", research.ingredient);
    summary(&mut out, &research.summary);
    recommendation(&mut out, &report.recommendation);
    evidence(&mut out, &research.evidence);
    out
}

pub fn quick(quick: &QuickResearch) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} (quick) ==", quick.ingredient);
    summary(&mut out, &quick.summary);
    recommendation(&mut out, &quick.recommendation);
    evidence(&mut out, &quick.evidence);
    out
}

pub fn product(product: &Product) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} [{}]", product.name, product.barcode);
    if let Some(brand) = &product.brand {
        let _ = writeln!(out, "Brand: {brand}");
    }
    if !product.ingredients.is_empty() {
        let _ = writeln!(out, "Ingredients: {}", product.ingredients.join(", "));
    }
    list(&mut out, "Allergens", &product.allergens);
    list(&mut out, "Additives", &product.additives);
    list(&mut out, "Categories", &product.categories);
    out
}

pub fn product_safety(safety: &ProductSafety) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Overall: {}", safety.overall_safety);
    let _ = writeln!(out, "{}", safety.summary);
    for flagged in &safety.flagged_ingredients {
        let _ = writeln!(out, "  ! {}: {}", flagged.name, flagged.concern);
    }
    out
}

fn summary(out: &mut String, summary: &IngredientSummary) {
    let _ = writeln!(
        out,
        "Safety: {}  Controversy: {}  Studies: {}",
        summary.safety_rating, summary.controversy_level, summary.total_studies
    );
    if !summary.regulatory_status.is_empty() {
        let _ = writeln!(out, "Regulators: {}", summary.regulatory_status.join(", "));
    }
    bullets(out, "Key findings", &summary.key_findings);
}

fn recommendation(out: &mut String, rec: &AiRecommendation) {
    let _ = writeln!(
        out,
        "\nRecommendation ({}, confidence {}):",
        rec.safety_level, rec.confidence
    );
    let _ = writeln!(out, "{}", rec.summary);
    if !rec.recommendation.is_empty() {
        let _ = writeln!(out, "{}", rec.recommendation);
    }
    bullets(out, "Key points", &rec.key_points);
    bullets(out, "Concerns", &rec.concerns);
    bullets(out, "Benefits", &rec.benefits);
    list(out, "Citations", &rec.citations);
}

fn evidence(out: &mut String, items: &[EvidenceItem]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "\nEvidence ({}):", items.len());
    for item in items.iter().take(EVIDENCE_SHOWN) {
        let year = item.year.map(|y| format!(" {y}")).unwrap_or_default();
        let _ = writeln!(
            out,
            "  [{}] {} ({}{}, {})",
            item.id, item.title, item.source, year, item.confidence
        );
        let _ = writeln!(out, "      {}", item.url);
    }
    if items.len() > EVIDENCE_SHOWN {
        let _ = writeln!(out, "  ... {} more", items.len() - EVIDENCE_SHOWN);
    }
}

fn bullets(out: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "{label}:");
    for item in items {
        let _ = writeln!(out, "  - {item}");
    }
}

fn list(out: &mut String, label: &str, items: &[String]) {
    if !items.is_empty() {
        let _ = writeln!(out, "{label}: {}", items.join(", "));
    }
}
