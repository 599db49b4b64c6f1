use std::collections::BTreeMap;

use super::named::NamedGenerator;

const MIN_SCORE: f64 = 0.2;

/// Picks a named generator for a column from free-form context
/// (`"<table> <column>"`). Must be deterministic for identical input.
pub trait GeneratorMatcher: Send + Sync {
    fn match_generator(&self, context: &str) -> Option<NamedGenerator>;
}

/// Bag-of-words cosine similarity between the column context and each
/// generator's keyword description.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    candidates: Vec<(NamedGenerator, BTreeMap<String, f64>)>,
    min_score: f64,
}

impl Default for KeywordMatcher {
    fn default() -> Self {
        Self::new(NamedGenerator::ALL)
    }
}

impl KeywordMatcher {
    pub fn new(generators: &[NamedGenerator]) -> Self {
        let candidates = generators
            .iter()
            .map(|named| (*named, term_vector(named.description())))
            .collect();
        Self {
            candidates,
            min_score: MIN_SCORE,
        }
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    /// Best candidate with its score; ties keep the earlier candidate.
    pub fn score(&self, context: &str) -> Option<(NamedGenerator, f64)> {
        let query = term_vector(context);
        if query.is_empty() {
            return None;
        }

        let mut best: Option<(NamedGenerator, f64)> = None;
        for (named, terms) in &self.candidates {
            let score = cosine(&query, terms);
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((*named, score));
            }
        }
        best
    }
}

impl GeneratorMatcher for KeywordMatcher {
    fn match_generator(&self, context: &str) -> Option<NamedGenerator> {
        self.score(context)
            .filter(|(_, score)| *score >= self.min_score)
            .map(|(named, _)| named)
    }
}

fn term_vector(text: &str) -> BTreeMap<String, f64> {
    let mut terms = BTreeMap::new();
    for token in text
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
    {
        *terms.entry(stem(&token.to_ascii_lowercase())).or_insert(0.0) += 1.0;
    }
    terms
}

fn stem(token: &str) -> String {
    if let Some(base) = token.strip_suffix("ies")
        && base.len() > 2
    {
        return format!("{base}y");
    }
    match token.strip_suffix('s') {
        Some(base) if base.len() > 3 && !base.ends_with('s') => base.to_string(),
        _ => token.to_string(),
    }
}

fn cosine(left: &BTreeMap<String, f64>, right: &BTreeMap<String, f64>) -> f64 {
    let dot: f64 = left
        .iter()
        .filter_map(|(term, weight)| right.get(term).map(|other| weight * other))
        .sum();
    let norm = |terms: &BTreeMap<String, f64>| terms.values().map(|w| w * w).sum::<f64>().sqrt();
    let denominator = norm(left) * norm(right);
    if denominator == 0.0 {
        0.0
    } else {
        dot / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_obvious_columns() {
        let matcher = KeywordMatcher::default();
        assert_eq!(
            matcher.match_generator("customers email"),
            Some(NamedGenerator::SafeEmail)
        );
        assert_eq!(
            matcher.match_generator("contacts phone"),
            Some(NamedGenerator::PhoneNumber)
        );
        assert_eq!(
            matcher.match_generator("companies company_name"),
            Some(NamedGenerator::CompanyName)
        );
    }

    #[test]
    fn unrelated_context_has_no_match() {
        let matcher = KeywordMatcher::default();
        assert_eq!(matcher.match_generator("xq zz_9"), None);
        assert_eq!(matcher.match_generator(""), None);
    }

    #[test]
    fn plural_table_names_are_stemmed() {
        assert_eq!(stem("companies"), "company");
        assert_eq!(stem("cities"), "city");
        assert_eq!(stem("address"), "address");
        assert_eq!(stem("emails"), "email");
    }

    #[test]
    fn matching_is_deterministic() {
        let matcher = KeywordMatcher::default();
        let first = matcher.score("orders shipping_address");
        for _ in 0..5 {
            assert_eq!(matcher.score("orders shipping_address"), first);
        }
    }
}
