//! Source-specific query strings derived from one ingredient name.

/// One query per adapter family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceQueries {
    pub literature: String,
    pub citation_graph: String,
    pub web: String,
    pub regulatory: String,
}

pub fn build_queries(ingredient: &str) -> SourceQueries {
    SourceQueries {
        literature: literature_query(ingredient),
        citation_graph: citation_graph_query(ingredient),
        web: web_query(ingredient),
        regulatory: regulatory_query(ingredient),
    }
}

/// PubMed field-qualified query restricted to health relevance.
pub fn literature_query(ingredient: &str) -> String {
    let term = clean(ingredient).replace('"', "");
    format!(
        "\"{term}\"[Title/Abstract] AND (health[Title/Abstract] OR safety[Title/Abstract] \
         OR toxicity[Title/Abstract] OR nutrition[Title/Abstract] \
         OR \"adverse effects\"[Title/Abstract])"
    )
}

pub fn citation_graph_query(ingredient: &str) -> String {
    format!(
        "{} (health OR safety OR nutrition OR toxicology OR dietary)",
        clean(ingredient)
    )
}

pub fn web_query(ingredient: &str) -> String {
    format!(
        "{} health effects safety research scientific",
        clean(ingredient)
    )
}

pub fn regulatory_query(ingredient: &str) -> String {
    format!(
        "{} (FDA OR EFSA OR WHO) regulation approved safe limit",
        clean(ingredient)
    )
}

fn clean(ingredient: &str) -> String {
    ingredient.split_whitespace().collect::<Vec<_>>().join(" ")
}
