//! [`SearchAdapter`] implementation over a single Meilisearch collection.

use carepoint_core::capability::SearchAdapter;
use carepoint_core::error::SearchIndexError;
use carepoint_core::ids::FacilityId;
use carepoint_core::model::{Facility, GeoPoint, SearchDocument};
use carepoint_core::query::SearchParams;
use meilisearch_sdk::client::Client;
use meilisearch_sdk::settings::{MinWordSizeForTypos, Settings, TypoToleranceSettings};

use crate::document::FacilityDocument;

const COLLECTION_NAME: &str = "facilities";
const DEFAULT_SEARCH_LIMIT: u32 = 20;
const DEFAULT_SUGGEST_LIMIT: u32 = 5;
const SUGGEST_RADIUS_KM: f64 = 500.0;

/// A `SearchAdapter` backed by a single named Meilisearch index, created
/// (but never schema-migrated in place) on [`Self::ensure_schema`].
pub struct MeiliSearchAdapter {
    client: Client,
}

impl MeiliSearchAdapter {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Result<Self, SearchIndexError> {
        let client = Client::new(url.into(), api_key).map_err(|err| SearchIndexError::Unavailable { message: err.to_string() })?;
        Ok(Self { client })
    }

    fn index(&self) -> meilisearch_sdk::indexes::Index {
        self.client.index(COLLECTION_NAME)
    }
}

#[async_trait::async_trait]
impl SearchAdapter for MeiliSearchAdapter {
    async fn ensure_schema(&self) -> Result<(), SearchIndexError> {
        // `get_index` fails if absent; on any failure attempt a create,
        // which is idempotent server-side if the index already exists.
        if self.client.get_index(COLLECTION_NAME).await.is_err() {
            self.client
                .create_index(COLLECTION_NAME, Some("id"))
                .await
                .map_err(|err| SearchIndexError::Unavailable { message: err.to_string() })?;
        }

        let settings = Settings::new()
            .with_searchable_attributes(["name", "facility_type", "tags", "insurance", "procedures"])
            .with_filterable_attributes(["is_active", "facility_type", "insurance", "_geo"])
            .with_sortable_attributes(["rating", "review_count", "created_at"])
            .with_typo_tolerance(
                TypoToleranceSettings::new()
                    .with_enabled(true)
                    .with_min_word_size_for_typos(MinWordSizeForTypos::new().with_one_typo(4).with_two_typos(7)),
            );

        self.index()
            .set_settings(&settings)
            .await
            .map_err(|err| SearchIndexError::Unavailable { message: err.to_string() })?;
        Ok(())
    }

    async fn upsert(&self, facility: &Facility, tags: Vec<String>, insurance: Vec<String>) -> Result<(), SearchIndexError> {
        let document = FacilityDocument::project(facility, tags, insurance);
        self.index()
            .add_or_update(&[document], Some("id"))
            .await
            .map_err(|err| SearchIndexError::IndexWriteError { id: facility.id.to_string(), message: err.to_string() })?;
        Ok(())
    }

    async fn delete(&self, id: &FacilityId) -> Result<(), SearchIndexError> {
        match self.index().delete_document(id.as_str()).await {
            Ok(_) => Ok(()),
            Err(meilisearch_sdk::errors::Error::Meilisearch(err)) if err.error_code == meilisearch_sdk::errors::ErrorCode::DocumentNotFound => Ok(()),
            Err(err) => Err(SearchIndexError::IndexWriteError { id: id.to_string(), message: err.to_string() }),
        }
    }

    async fn search(&self, params: &SearchParams) -> Result<(Vec<SearchDocument>, u64), SearchIndexError> {
        let query = if params.query.trim().is_empty() { "".to_string() } else { params.query.clone() };
        let limit = if params.limit == 0 { DEFAULT_SEARCH_LIMIT } else { params.limit };

        let filter = combined_filter(params);

        let index = self.index();
        let mut search_request = index.search();
        search_request
            .with_query(&query)
            .with_limit(limit as usize)
            .with_offset(params.offset as usize)
            .with_filter(&filter);

        let results = search_request
            .execute::<FacilityDocument>()
            .await
            .map_err(|err| SearchIndexError::QueryFailed { message: err.to_string() })?;

        let total_found = results.estimated_total_hits.unwrap_or(results.hits.len()) as u64;
        let documents = results.hits.into_iter().map(|hit| hit.result.into_search_document()).collect();
        Ok((documents, total_found))
    }

    async fn suggest(&self, query: &str, location: Option<GeoPoint>, limit: u32) -> Result<Vec<SearchDocument>, SearchIndexError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let limit = if limit == 0 { DEFAULT_SUGGEST_LIMIT } else { limit };
        let filter = location.filter(|loc| !loc.is_unknown()).map(|loc| geo_radius_filter(loc, SUGGEST_RADIUS_KM));

        let index = self.index();
        let mut search_request = index.search();
        search_request.with_query(query).with_limit(limit as usize);
        if let Some(filter) = &filter {
            search_request.with_filter(filter);
        }

        let results = search_request
            .execute::<FacilityDocument>()
            .await
            .map_err(|err| SearchIndexError::QueryFailed { message: err.to_string() })?;

        Ok(results.hits.into_iter().map(|hit| hit.result.into_search_document()).collect())
    }
}

/// Builds the `is_active = true` + optional insurance clause.
fn build_filter(params: &SearchParams) -> String {
    let mut clauses = vec!["is_active = true".to_string()];
    if let Some(insurance) = &params.insurance {
        clauses.push(format!("insurance = \"{}\"", insurance.replace('"', "")));
    }
    clauses.join(" AND ")
}

/// Folds `build_filter` and the geo-radius clause (if any) into a single
/// string for one `with_filter` call — Meilisearch's `with_filter`
/// replaces the stored filter rather than ANDing repeated calls, so every
/// clause must reach it together or the later call silently drops the
/// earlier ones (including `is_active = true`).
fn combined_filter(params: &SearchParams) -> String {
    let mut clauses = vec![build_filter(params)];
    if let Some(location) = params.location.filter(|loc| !loc.is_unknown()) {
        clauses.push(geo_radius_filter(location, params.radius_km.max(1.0)));
    }
    clauses.join(" AND ")
}

/// `radius_km` is converted to meters, as Meilisearch's `_geoRadius` filter
/// expects. Price bounds are intentionally not encoded here: the search
/// projection carries no price field (price lives on
/// `FacilityProcedure`), so price filtering is enforced by the database
/// fallback path instead (see `carepoint-resolver`).
fn geo_radius_filter(location: GeoPoint, radius_km: f64) -> String {
    format!("_geoRadius({}, {}, {})", location.lat, location.lon, (radius_km * 1000.0) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_filter_always_excludes_inactive() {
        let params = SearchParams::default();
        assert_eq!(build_filter(&params), "is_active = true");
    }

    #[test]
    fn build_filter_includes_insurance_equality() {
        let params = SearchParams { insurance: Some("NHIS".into()), ..Default::default() };
        assert_eq!(build_filter(&params), "is_active = true AND insurance = \"NHIS\"");
    }

    #[test]
    fn geo_radius_filter_converts_km_to_meters() {
        let filter = geo_radius_filter(GeoPoint { lat: 6.5, lon: 3.3 }, 50.0);
        assert_eq!(filter, "_geoRadius(6.5, 3.3, 50000)");
    }

    #[test]
    fn combined_filter_keeps_is_active_when_location_is_present() {
        let params = SearchParams { location: Some(GeoPoint { lat: 6.5, lon: 3.3 }), radius_km: 50.0, insurance: Some("NHIS".into()), ..Default::default() };
        let filter = combined_filter(&params);
        assert_eq!(filter, "is_active = true AND insurance = \"NHIS\" AND _geoRadius(6.5, 3.3, 50000)");
    }

    #[test]
    fn combined_filter_omits_geo_clause_without_a_location() {
        let params = SearchParams::default();
        assert_eq!(combined_filter(&params), "is_active = true");
    }
}
