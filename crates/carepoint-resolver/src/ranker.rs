//! The default [`Ranker`]: relevance + rating + proximity,
//! with a stable tie-break.

use std::cmp::Ordering;

use carepoint_core::capability::{RankContext, RankedFacility, Ranker};
use carepoint_core::model::SearchDocument;
use carepoint_core::query::QueryIntent;

/// Weights are hand-tuned constants, not learned; a ranking model swap
/// only needs a new [`Ranker`] implementation, not resolver changes.
const TERM_IN_NAME_WEIGHT: f64 = 2.0;
const TERM_IN_TAGS_WEIGHT: f64 = 1.5;
const RATING_WEIGHT: f64 = 1.0;
const REVIEW_COUNT_WEIGHT: f64 = 0.1;
const PROXIMITY_WEIGHT: f64 = 5.0;
const INTENT_MATCH_BONUS: f64 = 1.0;

pub struct DefaultRanker;

impl DefaultRanker {
    fn score(document: &SearchDocument, context: &RankContext) -> f64 {
        let name_lower = document.name.to_lowercase();
        let mut score = 0.0;

        for term in &context.terms {
            if name_lower.contains(term.as_str()) {
                score += TERM_IN_NAME_WEIGHT;
            }
            if document.tags.contains(term) {
                score += TERM_IN_TAGS_WEIGHT;
            }
        }

        score += document.rating * RATING_WEIGHT;
        score += (document.review_count as f64 + 1.0).ln() * REVIEW_COUNT_WEIGHT;

        if let Some(location) = context.location {
            if !location.is_unknown() && !document.location.is_unknown() {
                let distance = document.location.distance_km(&location);
                score += PROXIMITY_WEIGHT / (1.0 + distance);
            }
        }

        if matches!(context.intent, QueryIntent::LocationSensitive) && context.location.is_some() {
            score += INTENT_MATCH_BONUS;
        }

        score
    }
}

impl Ranker for DefaultRanker {
    fn rank(&self, candidates: Vec<SearchDocument>, context: &RankContext) -> Vec<RankedFacility> {
        let mut ranked: Vec<RankedFacility> = candidates.into_iter().map(|document| RankedFacility { score: Self::score(&document, context), document }).collect();

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.document.rating.partial_cmp(&a.document.rating).unwrap_or(Ordering::Equal))
                .then_with(|| b.document.review_count.cmp(&a.document.review_count))
                .then_with(|| a.document.id.as_str().cmp(b.document.id.as_str()))
        });
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carepoint_core::ids::FacilityId;
    use carepoint_core::model::GeoPoint;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn document(id: &str, name: &str, rating: f64, review_count: u64) -> SearchDocument {
        SearchDocument {
            id: FacilityId::new(id),
            name: name.to_string(),
            facility_type: "hospital".into(),
            is_active: true,
            location: GeoPoint::UNKNOWN,
            city: String::new(),
            state: String::new(),
            rating,
            review_count,
            created_at: Utc::now(),
            insurance: BTreeSet::new(),
            tags: BTreeSet::new(),
            procedures: BTreeSet::new(),
        }
    }

    fn context() -> RankContext {
        RankContext { terms: vec!["caesarean".to_string()], intent: QueryIntent::General, confidence: 0.6, location: None }
    }

    #[test]
    fn exact_name_match_outranks_unrelated_result() {
        let ranker = DefaultRanker;
        let candidates = vec![document("F2", "General Clinic", 4.8, 50), document("F1", "Caesarean Centre", 3.0, 5)];
        let ranked = ranker.rank(candidates, &context());
        assert_eq!(ranked[0].document.id, FacilityId::new("F1"));
    }

    #[test]
    fn ties_break_on_rating_then_review_count_then_id() {
        let ranker = DefaultRanker;
        let candidates = vec![document("F3", "Clinic", 4.0, 10), document("F1", "Clinic", 4.0, 10), document("F2", "Clinic", 4.0, 20)];
        let ranked = ranker.rank(candidates, &context());
        let ids: Vec<&str> = ranked.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(ids, vec!["F2", "F1", "F3"]);
    }
}
