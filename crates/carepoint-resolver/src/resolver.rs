//! `QueryResolver`: understand -> search -> spell-fix retry ->
//! database fallback -> hydrate -> rank -> facet -> paginate, plus the
//! suggest and single-facility paths.

use std::sync::Arc;
use std::time::Instant;

use carepoint_core::capability::{FacilityRepository, QueryUnderstanding, RankContext, Ranker, SearchAdapter};
use carepoint_core::error::{CoreResult, ValidationError};
use carepoint_core::ids::FacilityId;
use carepoint_core::model::{Facility, GeoPoint, SearchDocument};
use carepoint_core::query::{PageInfo, SearchParams, UnderstoodQuery};

use crate::analytics::{record_fire_and_forget, AnalyticsSink, SearchAnalyticsEvent};
use crate::facets::build_facets;

/// How many candidates are pulled from the search adapter for ranking and
/// faceting before the caller's own `limit`/`offset` is applied. Bounded so
/// a broad match doesn't force hydrating and ranking an unbounded result
/// set; `total_count` in the response still comes from the adapter's own
/// count, not from the length of this window.
const CANDIDATE_WINDOW: u32 = 500;
const DEFAULT_RADIUS_KM: f64 = 50.0;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Default)]
pub struct SearchFacilitiesRequest {
    pub raw_query: String,
    pub location: Option<GeoPoint>,
    pub radius_km: f64,
    pub insurance: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub limit: i64,
    pub offset: i64,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SearchFacilitiesResponse {
    pub results: Vec<carepoint_core::capability::RankedFacility>,
    pub facets: carepoint_core::query::Facets,
    pub page: PageInfo,
    pub total_count: u64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SuggestedFacility {
    pub document: SearchDocument,
    pub distance_km: Option<f64>,
}

/// Answers "find facilities matching a query near a location with
/// filters" in a single, ranked, paginated response.
///
/// `facilities` is expected to be the cache-aside decorator (hydration
/// reads go through it); `db_fallback`, when present, is the raw store
/// repository used only for the last-resort search path —
/// kept separate from `facilities` so the fallback query never serves a
/// stale cached search result.
pub struct QueryResolver {
    search_adapter: Arc<dyn SearchAdapter>,
    facilities: Arc<dyn FacilityRepository>,
    db_fallback: Option<Arc<dyn FacilityRepository>>,
    understanding: Option<Arc<dyn QueryUnderstanding>>,
    ranker: Arc<dyn Ranker>,
    analytics: Arc<dyn AnalyticsSink>,
}

impl QueryResolver {
    pub fn new(
        search_adapter: Arc<dyn SearchAdapter>,
        facilities: Arc<dyn FacilityRepository>,
        db_fallback: Option<Arc<dyn FacilityRepository>>,
        understanding: Option<Arc<dyn QueryUnderstanding>>,
        ranker: Arc<dyn Ranker>,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        Self { search_adapter, facilities, db_fallback, understanding, ranker, analytics }
    }

    pub async fn search_facilities(&self, request: SearchFacilitiesRequest) -> CoreResult<SearchFacilitiesResponse> {
        let started = Instant::now();
        let (limit, offset) = validate_pagination(request.limit, request.offset)?;
        if request.radius_km < 0.0 {
            return Err(ValidationError::NegativeRadius { actual: request.radius_km }.into());
        }

        let qu = match &self.understanding {
            Some(understanding) => understanding.understand(&request.raw_query),
            None => UnderstoodQuery::raw_fallback(&request.raw_query),
        };

        let location = request.location.filter(|loc| !loc.is_unknown());
        let effective_radius = if location.is_some() && request.radius_km <= 0.0 { DEFAULT_RADIUS_KM } else { request.radius_km };

        let mut params = SearchParams {
            query: qu.normalized.clone(),
            location,
            radius_km: effective_radius,
            insurance: request.insurance.clone(),
            min_price: request.min_price,
            max_price: request.max_price,
            limit: CANDIDATE_WINDOW,
            offset: 0,
        };

        let (mut candidates, mut total_found) = self.search_adapter.search(&params).await?;

        if candidates.is_empty() && qu.spell_fixed != request.raw_query && !qu.spell_fixed.trim().is_empty() {
            params.query = qu.spell_fixed.clone();
            let (retried, retried_total) = self.search_adapter.search(&params).await?;
            candidates = retried;
            total_found = retried_total;
        }

        if candidates.is_empty() {
            if let Some(db_fallback) = &self.db_fallback {
                let (facilities, count) = db_fallback.search_with_count(&params).await?;
                candidates = facilities.iter().map(facility_to_search_document).collect();
                total_found = count;
            }
        }

        self.hydrate(&mut candidates).await?;

        let facet_refs: Vec<&SearchDocument> = candidates.iter().collect();
        let facets = build_facets(&facet_refs);

        let context = RankContext { terms: qu.terms.clone(), intent: qu.intent, confidence: qu.confidence, location };
        let ranked = self.ranker.rank(candidates, &context);

        let page = PageInfo::compute(total_found, limit, offset);
        let results: Vec<_> = ranked.into_iter().skip(offset as usize).take(limit as usize).collect();

        record_fire_and_forget(
            self.analytics.clone(),
            SearchAnalyticsEvent {
                query: request.raw_query.clone(),
                normalized: qu.normalized,
                intent: qu.intent,
                confidence: qu.confidence,
                result_count: results.len(),
                latency_ms: started.elapsed().as_millis() as u64,
                location,
                session_id: request.session_id,
            },
        );

        Ok(SearchFacilitiesResponse { results, facets, page, total_count: total_found })
    }

    /// Fills in fields the search index may be missing or stale on, using
    /// the store (through the cached repository) as the source of truth.
    /// Facilities no longer present in the store (deleted since the index
    /// was last updated) are dropped from the result.
    async fn hydrate(&self, candidates: &mut Vec<SearchDocument>) -> CoreResult<()> {
        if candidates.is_empty() {
            return Ok(());
        }
        let ids: Vec<FacilityId> = candidates.iter().map(|doc| doc.id.clone()).collect();
        let hydrated = self.facilities.get_by_ids(&ids).await?;
        let by_id: std::collections::HashMap<&FacilityId, &Facility> = hydrated.iter().map(|f| (&f.id, f)).collect();

        candidates.retain_mut(|doc| match by_id.get(&doc.id) {
            Some(facility) => {
                merge_facility_into_document(doc, facility);
                true
            }
            None => false,
        });
        Ok(())
    }

    /// A stripped-down variant: no hydration, light records, distance
    /// attached when a location is supplied.
    pub async fn suggest(&self, query: &str, location: Option<GeoPoint>, limit: u32) -> CoreResult<Vec<SuggestedFacility>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let location = location.filter(|loc| !loc.is_unknown());
        let documents = self.search_adapter.suggest(query, location, limit).await?;
        Ok(documents
            .into_iter()
            .map(|document| {
                let distance_km = match location {
                    Some(loc) if !document.location.is_unknown() => Some(document.location.distance_km(&loc)),
                    _ => None,
                };
                SuggestedFacility { document, distance_km }
            })
            .collect())
    }

    /// Single-facility path: cached repository `get_by_id`.
    pub async fn get_facility(&self, id: &FacilityId) -> CoreResult<Option<Facility>> {
        Ok(self.facilities.get_by_id(id).await?)
    }
}

fn validate_pagination(limit: i64, offset: i64) -> Result<(u32, u32), ValidationError> {
    if limit <= 0 || limit > MAX_LIMIT {
        return Err(ValidationError::LimitOutOfRange { actual: limit, max: MAX_LIMIT });
    }
    if offset < 0 {
        return Err(ValidationError::NegativeOffset { actual: offset });
    }
    Ok((limit as u32, offset as u32))
}

fn facility_to_search_document(facility: &Facility) -> SearchDocument {
    SearchDocument {
        id: facility.id.clone(),
        name: facility.name.clone(),
        facility_type: facility.facility_type.clone(),
        is_active: facility.is_active,
        location: facility.location,
        city: facility.address.city.clone(),
        state: facility.address.state.clone(),
        rating: facility.rating,
        review_count: facility.review_count,
        created_at: facility.created_at,
        insurance: Default::default(),
        tags: Default::default(),
        procedures: Default::default(),
    }
}

fn merge_facility_into_document(document: &mut SearchDocument, facility: &Facility) {
    document.name = facility.name.clone();
    document.facility_type = facility.facility_type.clone();
    document.is_active = facility.is_active;
    document.location = facility.location;
    document.city = facility.address.city.clone();
    document.state = facility.address.state.clone();
    document.rating = facility.rating;
    document.review_count = facility.review_count;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use carepoint_core::error::{SearchIndexError, StoreError};
    use carepoint_core::query::{FacilityListFilter, QueryIntent};
    use carepoint_core::model::Address;
    use chrono::Utc;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    struct FakeSearch {
        documents: Vec<SearchDocument>,
    }

    #[async_trait]
    impl SearchAdapter for FakeSearch {
        async fn ensure_schema(&self) -> Result<(), SearchIndexError> {
            Ok(())
        }
        async fn upsert(&self, _facility: &Facility, _tags: Vec<String>, _insurance: Vec<String>) -> Result<(), SearchIndexError> {
            Ok(())
        }
        async fn delete(&self, _id: &FacilityId) -> Result<(), SearchIndexError> {
            Ok(())
        }
        async fn search(&self, params: &SearchParams) -> Result<(Vec<SearchDocument>, u64), SearchIndexError> {
            let matches: Vec<SearchDocument> = self
                .documents
                .iter()
                .filter(|doc| params.query.is_empty() || doc.name.to_lowercase().contains(&params.query.to_lowercase()) || doc.tags.iter().any(|t| t == &params.query.to_lowercase()))
                .cloned()
                .collect();
            let total = matches.len() as u64;
            Ok((matches, total))
        }
        async fn suggest(&self, query: &str, _location: Option<GeoPoint>, _limit: u32) -> Result<Vec<SearchDocument>, SearchIndexError> {
            Ok(self.documents.iter().filter(|doc| doc.name.to_lowercase().contains(&query.to_lowercase())).cloned().collect())
        }
    }

    struct FakeFacilities {
        rows: Vec<Facility>,
    }

    #[async_trait]
    impl FacilityRepository for FakeFacilities {
        async fn get_by_id(&self, id: &FacilityId) -> Result<Option<Facility>, StoreError> {
            Ok(self.rows.iter().find(|f| &f.id == id).cloned())
        }
        async fn get_by_ids(&self, ids: &[FacilityId]) -> Result<Vec<Facility>, StoreError> {
            Ok(self.rows.iter().filter(|f| ids.contains(&f.id)).cloned().collect())
        }
        async fn list(&self, _filter: &FacilityListFilter) -> Result<Vec<Facility>, StoreError> {
            Ok(self.rows.clone())
        }
        async fn search_with_count(&self, _params: &SearchParams) -> Result<(Vec<Facility>, u64), StoreError> {
            Ok((self.rows.clone(), self.rows.len() as u64))
        }
        async fn create(&self, facility: Facility) -> Result<Facility, StoreError> {
            Ok(facility)
        }
        async fn update(&self, facility: Facility) -> Result<Facility, StoreError> {
            Ok(facility)
        }
        async fn delete(&self, _id: &FacilityId) -> Result<(), StoreError> {
            Ok(())
        }
        async fn top_facilities(&self, n: u32) -> Result<Vec<Facility>, StoreError> {
            Ok(self.rows.iter().take(n as usize).cloned().collect())
        }
    }

    struct NoopAnalytics {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl AnalyticsSink for NoopAnalytics {
        async fn record(&self, _event: SearchAnalyticsEvent) {
            *self.calls.lock().unwrap() += 1;
        }
    }

    fn facility(id: &str, name: &str, rating: f64) -> Facility {
        Facility {
            id: FacilityId::new(id),
            name: name.to_string(),
            address: Address::default(),
            location: GeoPoint::UNKNOWN,
            phone: None,
            email: None,
            website: None,
            facility_type: "hospital".into(),
            rating,
            review_count: 10,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn document_for(facility: &Facility, tags: &[&str]) -> SearchDocument {
        SearchDocument {
            id: facility.id.clone(),
            name: facility.name.clone(),
            facility_type: facility.facility_type.clone(),
            is_active: facility.is_active,
            location: facility.location,
            city: facility.address.city.clone(),
            state: facility.address.state.clone(),
            rating: facility.rating,
            review_count: facility.review_count,
            created_at: facility.created_at,
            insurance: BTreeSet::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            procedures: BTreeSet::new(),
        }
    }

    #[tokio::test]
    async fn typo_search_scenario_ranks_corrected_match_first() {
        let centre = facility("F1", "Caesarean Centre", 4.5);
        let documents = vec![document_for(&centre, &["caesarean", "caesarean_section"])];
        let search = Arc::new(FakeSearch { documents });
        let facilities = Arc::new(FakeFacilities { rows: vec![centre] });

        let resolver = QueryResolver::new(
            search,
            facilities,
            None,
            Some(Arc::new(carepoint_normalize::ConceptQueryUnderstanding::new(carepoint_normalize::tables::QueryTables::built_in()))),
            Arc::new(crate::ranker::DefaultRanker),
            Arc::new(NoopAnalytics { calls: Mutex::new(0) }),
        );

        let response = resolver
            .search_facilities(SearchFacilitiesRequest { raw_query: "ceasarean".to_string(), radius_km: 0.0, limit: 10, offset: 0, ..Default::default() })
            .await
            .unwrap();

        assert!(!response.results.is_empty());
        assert_eq!(response.results[0].document.id, FacilityId::new("F1"));
    }

    #[tokio::test]
    async fn pagination_totals_match_spec_scenario() {
        let rows: Vec<Facility> = (0..37).map(|i| facility(&format!("F{i}"), "Clinic", 4.0)).collect();
        let documents: Vec<SearchDocument> = rows.iter().map(|f| document_for(f, &[])).collect();
        let search = Arc::new(FakeSearch { documents });
        let facilities = Arc::new(FakeFacilities { rows });

        let resolver = QueryResolver::new(search, facilities, None, None, Arc::new(crate::ranker::DefaultRanker), Arc::new(NoopAnalytics { calls: Mutex::new(0) }));

        let response = resolver
            .search_facilities(SearchFacilitiesRequest { raw_query: "".to_string(), radius_km: 0.0, limit: 10, offset: 20, ..Default::default() })
            .await
            .unwrap();

        assert_eq!(response.results.len(), 10);
        assert_eq!(response.total_count, 37);
        assert!(response.page.has_next);
        assert!(response.page.has_prev);
        assert_eq!(response.page.current_page, 3);
        assert_eq!(response.page.total_pages, 4);
    }

    #[tokio::test]
    async fn zero_limit_is_rejected() {
        let search = Arc::new(FakeSearch { documents: vec![] });
        let facilities = Arc::new(FakeFacilities { rows: vec![] });
        let resolver = QueryResolver::new(search, facilities, None, None, Arc::new(crate::ranker::DefaultRanker), Arc::new(NoopAnalytics { calls: Mutex::new(0) }));

        let err = resolver
            .search_facilities(SearchFacilitiesRequest { raw_query: "x".to_string(), limit: 0, offset: 0, ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, carepoint_core::error::CoreError::Validation(ValidationError::LimitOutOfRange { .. })));
    }

    #[tokio::test]
    async fn empty_query_suggest_short_circuits_without_touching_index() {
        let search = Arc::new(FakeSearch { documents: vec![document_for(&facility("F1", "Clinic", 4.0), &[])] });
        let facilities = Arc::new(FakeFacilities { rows: vec![] });
        let resolver = QueryResolver::new(search, facilities, None, None, Arc::new(crate::ranker::DefaultRanker), Arc::new(NoopAnalytics { calls: Mutex::new(0) }));

        let results = resolver.suggest("   ", None, 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn query_intent_default_is_general() {
        assert_eq!(QueryIntent::default(), QueryIntent::General);
    }
}
