//! Query understanding: synonym expansion, spell-fix, and intent detection
//! applied to raw user queries before searching.

use carepoint_core::capability::QueryUnderstanding;
use carepoint_core::query::{tokenize, QueryIntent, UnderstoodQuery};

use crate::tables::QueryTables;

/// The concrete, table-driven [`QueryUnderstanding`] implementation.
///
/// Construct with [`QueryTables::load_from_path`] or [`QueryTables::built_in`].
/// There is deliberately no "disabled" variant of this type; absence of
/// query understanding is represented at the call site by
/// holding `Option<Arc<dyn QueryUnderstanding>>` and falling back to
/// [`UnderstoodQuery::raw_fallback`], not by a no-op implementation here.
pub struct ConceptQueryUnderstanding {
    tables: QueryTables,
}

impl ConceptQueryUnderstanding {
    pub fn new(tables: QueryTables) -> Self {
        Self { tables }
    }
}

impl QueryUnderstanding for ConceptQueryUnderstanding {
    fn understand(&self, raw_query: &str) -> UnderstoodQuery {
        let terms = tokenize(raw_query);
        if terms.is_empty() {
            return UnderstoodQuery::raw_fallback(raw_query);
        }

        let spell_fixed_terms: Vec<String> = terms
            .iter()
            .map(|term| self.tables.spelling.get(term).cloned().unwrap_or_else(|| term.clone()))
            .collect();
        let spell_fixed = spell_fixed_terms.join(" ");
        let was_corrected = spell_fixed_terms != terms;

        let mut synonyms = Vec::new();
        for term in &spell_fixed_terms {
            if let Some(syns) = self.tables.synonyms.get(term) {
                for syn in syns {
                    if !synonyms.contains(syn) {
                        synonyms.push(syn.clone());
                    }
                }
            }
        }

        let lower_query = raw_query.to_lowercase();
        let intent = self
            .tables
            .intent_keywords
            .iter()
            .find(|(keyword, _)| lower_query.contains(keyword.as_str()))
            .map(|(_, intent)| *intent)
            .unwrap_or(QueryIntent::General);

        let confidence = match (intent, was_corrected) {
            (QueryIntent::General, false) => 0.6,
            (QueryIntent::General, true) => 0.75,
            (_, false) => 0.85,
            (_, true) => 0.95,
        };

        UnderstoodQuery {
            normalized: spell_fixed.to_lowercase(),
            terms: spell_fixed_terms,
            synonyms,
            spell_fixed,
            intent,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn understander() -> ConceptQueryUnderstanding {
        ConceptQueryUnderstanding::new(QueryTables::built_in())
    }

    #[test]
    fn empty_query_falls_back() {
        let result = understander().understand("");
        assert_eq!(result.normalized, "");
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn typo_search_scenario_spell_fixes_and_ranks_confidence() {
        // Spec scenario 4: query "ceasarean" should spell-fix toward "caesarean".
        let result = understander().understand("ceasarean");
        assert_eq!(result.spell_fixed, "caesarean");
        assert!(result.confidence > 0.6);
    }

    #[test]
    fn detects_price_sensitive_intent() {
        let result = understander().understand("cheapest clinic nearby");
        assert!(matches!(result.intent, QueryIntent::PriceSensitive) || matches!(result.intent, QueryIntent::LocationSensitive));
    }

    #[test]
    fn detects_urgent_intent() {
        let result = understander().understand("emergency care");
        assert_eq!(result.intent, QueryIntent::Urgent);
    }

    #[test]
    fn unknown_terms_default_to_general_intent() {
        let result = understander().understand("routine checkup");
        assert_eq!(result.intent, QueryIntent::General);
    }
}
