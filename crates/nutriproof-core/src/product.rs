//! Product-level safety roll-up across researched ingredients.

use nutriproof_schema::{AggregatedResearch, FlaggedIngredient, ProductSafety, SafetyRating};

const CONCERNING_TERMS: &[&str] = &["toxic", "harmful", "carcinogen", "adverse", "danger"];
const CONCERN_NOTE: &str =
    "Some studies suggest potential concerns; research this ingredient for details";

/// Flags every ingredient whose paper titles or abstracts mention a
/// concerning term.
pub fn assess_product(
    product_name: &str,
    researched: &[(String, AggregatedResearch)],
) -> ProductSafety {
    if researched.is_empty() {
        return ProductSafety {
            overall_safety: SafetyRating::Unknown,
            summary: format!("No ingredients of {product_name} could be researched."),
            flagged_ingredients: Vec::new(),
        };
    }

    let flagged_ingredients: Vec<FlaggedIngredient> = researched
        .iter()
        .filter(|(_, research)| has_concerns(research))
        .map(|(name, _)| FlaggedIngredient {
            name: name.clone(),
            concern: CONCERN_NOTE.to_string(),
        })
        .collect();

    if flagged_ingredients.is_empty() {
        ProductSafety {
            overall_safety: SafetyRating::Safe,
            summary: format!("{product_name} ingredients appear safe based on available research."),
            flagged_ingredients,
        }
    } else {
        ProductSafety {
            overall_safety: SafetyRating::Caution,
            summary: format!(
                "{} ingredient(s) may need attention.",
                flagged_ingredients.len()
            ),
            flagged_ingredients,
        }
    }
}

fn has_concerns(research: &AggregatedResearch) -> bool {
    research.papers.iter().any(|paper| {
        let title = paper.title.to_lowercase();
        let abstract_text = paper
            .abstract_text
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        CONCERNING_TERMS
            .iter()
            .any(|term| title.contains(term) || abstract_text.contains(term))
    })
}

#[cfg(test)]
mod tests {
    use nutriproof_schema::PaperRecord;

    use super::*;

    fn research(titles: &[&str]) -> AggregatedResearch {
        AggregatedResearch {
            papers: titles
                .iter()
                .map(|t| PaperRecord {
                    title: t.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn nothing_researched_is_unknown() {
        let safety = assess_product("Cola", &[]);
        assert_eq!(safety.overall_safety, SafetyRating::Unknown);
    }

    #[test]
    fn clean_research_is_safe() {
        let safety = assess_product("Cola", &[("water".into(), research(&["Hydration study"]))]);
        assert_eq!(safety.overall_safety, SafetyRating::Safe);
        assert!(safety.flagged_ingredients.is_empty());
        assert_eq!(safety.summary, "Cola ingredients appear safe based on available research.");
    }

    #[test]
    fn concerning_terms_flag_ingredient() {
        let mut flagged = research(&["Neutral title"]);
        flagged.papers[0].abstract_text = Some("Reported ADVERSE events in rats.".into());
        let safety = assess_product(
            "Cola",
            &[
                ("water".into(), research(&["Hydration"])),
                ("e150d".into(), flagged),
                ("aspartame".into(), research(&["Potential carcinogenic effects"])),
            ],
        );
        assert_eq!(safety.overall_safety, SafetyRating::Caution);
        let names: Vec<_> = safety.flagged_ingredients.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["e150d", "aspartame"]);
        assert_eq!(safety.summary, "2 ingredient(s) may need attention.");
    }
}
