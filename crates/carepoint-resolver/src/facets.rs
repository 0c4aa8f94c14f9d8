//! Facet computation over the full filtered-but-unpaginated candidate set.
//! Facet counts MUST reflect every candidate, never just the page
//! returned to the caller.

use std::collections::BTreeMap;

use carepoint_core::model::SearchDocument;
use carepoint_core::query::{FacetBucket, Facets};

const RATING_BUCKETS: &[(f64, f64, &str)] = &[(4.0, 5.01, "4-5"), (3.0, 4.0, "3-4"), (2.0, 3.0, "2-3"), (0.0, 2.0, "0-2")];

/// Buckets on `{facility_type, city, state, insurance, rating}`. `city`
/// and `state` are read straight off `SearchDocument.city`/`.state`
/// (populated from `Facility.address` by the resolver's hydrate step
/// before this runs) rather than sniffed out of the undifferentiated
/// `tags` set. Empty values (facility has no resolved address) are
/// excluded from their bucket rather than counted as a blank label.
///
/// Price-range buckets are not computed here: `SearchDocument` carries no
/// price, since price lives on `FacilityProcedure` (a facility can offer
/// many procedures at many prices, so there is no single per-facility
/// price to bucket on without first picking a procedure scope, which the
/// resolver's candidate set does not carry). A price facet would need to
/// join against `FacilityProcedureRepository` per candidate id — left as
/// a follow-up once that repository is threaded into the resolver.
pub fn build_facets(candidates: &[&SearchDocument]) -> Facets {
    let mut facility_type_counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut city_counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut state_counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut insurance_counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut rating_counts: BTreeMap<&'static str, u64> = BTreeMap::new();

    for document in candidates {
        *facility_type_counts.entry(document.facility_type.clone()).or_default() += 1;
        if !document.city.trim().is_empty() {
            *city_counts.entry(document.city.clone()).or_default() += 1;
        }
        if !document.state.trim().is_empty() {
            *state_counts.entry(document.state.clone()).or_default() += 1;
        }
        for insurance in &document.insurance {
            *insurance_counts.entry(insurance.clone()).or_default() += 1;
        }
        if let Some((_, _, label)) = RATING_BUCKETS.iter().find(|(low, high, _)| document.rating >= *low && document.rating < *high) {
            *rating_counts.entry(label).or_default() += 1;
        }
    }

    let mut buckets = BTreeMap::new();
    buckets.insert("facility_type".to_string(), to_buckets(facility_type_counts));
    buckets.insert("city".to_string(), to_buckets(city_counts));
    buckets.insert("state".to_string(), to_buckets(state_counts));
    buckets.insert("insurance".to_string(), to_buckets(insurance_counts));
    buckets.insert(
        "rating".to_string(),
        rating_counts.into_iter().map(|(value, count)| FacetBucket { value: value.to_string(), count }).collect(),
    );
    Facets(buckets)
}

fn to_buckets(counts: BTreeMap<String, u64>) -> Vec<FacetBucket> {
    counts.into_iter().map(|(value, count)| FacetBucket { value, count }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use carepoint_core::ids::FacilityId;
    use carepoint_core::model::GeoPoint;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn document(facility_type: &str, rating: f64, insurance: &[&str]) -> SearchDocument {
        document_with_address(facility_type, rating, insurance, "", "")
    }

    fn document_with_address(facility_type: &str, rating: f64, insurance: &[&str], city: &str, state: &str) -> SearchDocument {
        SearchDocument {
            id: FacilityId::new("f"),
            name: "x".into(),
            facility_type: facility_type.into(),
            is_active: true,
            location: GeoPoint::UNKNOWN,
            city: city.into(),
            state: state.into(),
            rating,
            review_count: 0,
            created_at: Utc::now(),
            insurance: insurance.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            tags: BTreeSet::new(),
            procedures: BTreeSet::new(),
        }
    }

    #[test]
    fn counts_reflect_the_full_candidate_set() {
        let docs = vec![document("hospital", 4.5, &["nhis"]), document("hospital", 2.5, &[]), document("clinic", 4.2, &["nhis"])];
        let refs: Vec<&SearchDocument> = docs.iter().collect();
        let facets = build_facets(&refs);

        let facility_types = &facets.0["facility_type"];
        let hospital = facility_types.iter().find(|b| b.value == "hospital").unwrap();
        assert_eq!(hospital.count, 2);

        let rating = &facets.0["rating"];
        let top_bucket = rating.iter().find(|b| b.value == "4-5").unwrap();
        assert_eq!(top_bucket.count, 2);
    }

    #[test]
    fn city_and_state_buckets_reflect_resolved_address_and_skip_blanks() {
        let docs = vec![
            document_with_address("hospital", 4.5, &[], "Lagos", "Lagos"),
            document_with_address("hospital", 4.0, &[], "Lagos", "Lagos"),
            document_with_address("clinic", 3.5, &[], "Port Harcourt", "Rivers"),
            document_with_address("clinic", 3.0, &[], "", ""),
        ];
        let refs: Vec<&SearchDocument> = docs.iter().collect();
        let facets = build_facets(&refs);

        let cities = &facets.0["city"];
        assert_eq!(cities.iter().find(|b| b.value == "Lagos").unwrap().count, 2);
        assert_eq!(cities.iter().find(|b| b.value == "Port Harcourt").unwrap().count, 1);
        assert!(cities.iter().all(|b| !b.value.is_empty()));

        let states = &facets.0["state"];
        assert_eq!(states.iter().find(|b| b.value == "Rivers").unwrap().count, 1);
    }
}
