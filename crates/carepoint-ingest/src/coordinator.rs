//! `IngestionCoordinator::sync_current_data`: the page loop, the
//! per-record pipeline, and the address/geocode priority ladder.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use carepoint_core::capability::{
    EnrichmentRepository, FacilityProcedureRepository, FacilityRepository, GeoProvider, IdempotencyStore, ProcedureRepository, ProviderDataSource, ProviderError,
    ProviderRecord, SearchAdapter,
};
use carepoint_core::error::CoreResult;
use carepoint_core::ids::{FacilityId, IdempotencyKey, ProcedureId};
use carepoint_core::model::{Address, EnrichmentStatus, Facility, FacilityProcedure, GeoPoint, Procedure, ProcedureEnrichment};
use carepoint_normalize::tables::NormalizationTables;
use chrono::Utc;
use serde::Serialize;

use crate::backoff;
use crate::config::IngestConfig;
use crate::region::infer_region_from_tags;

const MAX_PAGE_FETCH_ATTEMPTS: u32 = 5;

/// Counts produced by a single `sync_current_data` run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionSummary {
    pub facilities_created: u64,
    pub facilities_updated: u64,
    pub procedures_created: u64,
    pub procedures_updated: u64,
    pub records_skipped_idempotent: u64,
    pub record_errors: u64,
    pub index_errors: u64,
    /// Set when the page loop gave up after exhausting retries or hit a
    /// permanent provider error; the counts above still reflect every
    /// record processed before the abort.
    pub aborted: bool,
}

struct RecordOutcome {
    facility_created: bool,
    procedure_created: bool,
}

/// Pulls provider records page-by-page and makes the store, search index,
/// and cache converge to a consistent view.
///
/// One `IngestionCoordinator` is constructed per process and shared across
/// the startup sync and the periodic scheduler; `running` enforces the
/// at-most-one-sync-per-provider guarantee.
pub struct IngestionCoordinator {
    provider: Arc<dyn ProviderDataSource>,
    facilities: Arc<dyn FacilityRepository>,
    procedures: Arc<dyn ProcedureRepository>,
    facility_procedures: Arc<dyn FacilityProcedureRepository>,
    enrichments: Arc<dyn EnrichmentRepository>,
    idempotency: Arc<dyn IdempotencyStore>,
    search: Arc<dyn SearchAdapter>,
    geo: Arc<dyn GeoProvider>,
    normalization_tables: Arc<NormalizationTables>,
    config: IngestConfig,
    running: Mutex<HashSet<String>>,
}

impl IngestionCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<dyn ProviderDataSource>,
        facilities: Arc<dyn FacilityRepository>,
        procedures: Arc<dyn ProcedureRepository>,
        facility_procedures: Arc<dyn FacilityProcedureRepository>,
        enrichments: Arc<dyn EnrichmentRepository>,
        idempotency: Arc<dyn IdempotencyStore>,
        search: Arc<dyn SearchAdapter>,
        geo: Arc<dyn GeoProvider>,
        normalization_tables: Arc<NormalizationTables>,
        config: IngestConfig,
    ) -> Self {
        Self {
            provider,
            facilities,
            procedures,
            facility_procedures,
            enrichments,
            idempotency,
            search,
            geo,
            normalization_tables,
            config,
            running: Mutex::new(HashSet::new()),
        }
    }

    /// Runs the full ingestion pipeline for `provider_id`. Returns the
    /// partial summary (never an error) when the page loop aborts; only
    /// infrastructure failures in the concurrency guard itself would be an
    /// error, and there are none — the guard is synchronous and infallible.
    pub async fn sync_current_data(&self, provider_id: &str) -> CoreResult<IngestionSummary> {
        if !self.try_start(provider_id) {
            tracing::warn!(provider_id, "sync already running for this provider, skipping overlap");
            return Ok(IngestionSummary::default());
        }
        let result = self.run_sync(provider_id).await;
        self.finish(provider_id);
        result
    }

    fn try_start(&self, provider_id: &str) -> bool {
        self.running.lock().unwrap().insert(provider_id.to_string())
    }

    fn finish(&self, provider_id: &str) {
        self.running.lock().unwrap().remove(provider_id);
    }

    async fn run_sync(&self, provider_id: &str) -> CoreResult<IngestionSummary> {
        let mut summary = IngestionSummary::default();
        let mut cursor: Option<String> = None;

        loop {
            let page_cursor_key = cursor.clone().unwrap_or_default();
            let page = match self.fetch_page_with_retry(provider_id, cursor.as_deref()).await {
                Some(page) => page,
                None => {
                    summary.aborted = true;
                    break;
                }
            };
            let (records, next_cursor) = page;

            for record in records {
                match self.process_record(provider_id, &page_cursor_key, record).await {
                    Ok(Some(outcome)) => {
                        if outcome.facility_created {
                            summary.facilities_created += 1;
                        } else {
                            summary.facilities_updated += 1;
                        }
                        if outcome.procedure_created {
                            summary.procedures_created += 1;
                        } else {
                            summary.procedures_updated += 1;
                        }
                    }
                    Ok(None) => summary.records_skipped_idempotent += 1,
                    Err(err) => {
                        tracing::warn!(provider_id, error = %err, "record processing failed, continuing sync");
                        summary.record_errors += 1;
                    }
                }
            }

            match next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(summary)
    }

    async fn fetch_page_with_retry(&self, provider_id: &str, cursor: Option<&str>) -> Option<carepoint_core::capability::ProviderPage> {
        let mut attempt = 0u32;
        loop {
            match self.provider.list_records(provider_id, cursor).await {
                Ok(page) => return Some(page),
                Err(ProviderError::Permanent { message }) => {
                    tracing::error!(provider_id, message, "permanent provider error, aborting sync");
                    return None;
                }
                Err(ProviderError::Transient { message }) => {
                    if attempt >= MAX_PAGE_FETCH_ATTEMPTS {
                        tracing::error!(provider_id, message, attempts = attempt, "provider fetch exhausted retries, aborting sync");
                        return None;
                    }
                    let delay = backoff::delay_for_attempt(attempt);
                    tracing::warn!(provider_id, attempt, ?delay, message, "transient provider error, retrying page fetch");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Processes one provider record end-to-end. Returns
    /// `Ok(None)` when the record was already ingested within the
    /// idempotency window, `Ok(Some(outcome))` otherwise.
    async fn process_record(&self, provider_id: &str, page_cursor_key: &str, record: ProviderRecord) -> CoreResult<Option<RecordOutcome>> {
        let idempotency_key = IdempotencyKey::compute(provider_id, page_cursor_key, &record.fingerprint());
        if self.idempotency.contains(&idempotency_key).await? {
            return Ok(None);
        }

        let normalized = carepoint_normalize::normalize(&record.service_name, &self.normalization_tables);

        let normalized_facility_name = record.facility_name.trim().to_lowercase();
        let facility_id = FacilityId::derive(provider_id, &record.facility_external_id, &normalized_facility_name);

        let (address, location) = self.resolve_location(&record).await;

        let existing_facility = self.facilities.get_by_id(&facility_id).await?;
        let facility_created = existing_facility.is_none();
        let now = Utc::now();
        let facility = match existing_facility {
            Some(mut existing) => {
                existing.name = record.facility_name.clone();
                existing.address = address;
                existing.location = location;
                existing.updated_at = now;
                existing
            }
            None => Facility {
                id: facility_id.clone(),
                name: record.facility_name.clone(),
                address,
                location,
                phone: None,
                email: None,
                website: None,
                facility_type: "unclassified".to_string(),
                rating: 0.0,
                review_count: 0,
                is_active: true,
                created_at: now,
                updated_at: now,
            },
        };
        let saved_facility = if facility_created { self.facilities.create(facility).await? } else { self.facilities.update(facility).await? };

        let normalized_name_key = if normalized.display_name.is_empty() {
            record.service_name.trim().to_lowercase()
        } else {
            normalized.display_name.to_lowercase()
        };
        let procedure_id = ProcedureId::derive(None, &normalized_name_key);
        let existing_procedure = self.procedures.get_by_id(&procedure_id).await?;
        let procedure_created = existing_procedure.is_none();
        let procedure = Procedure {
            id: procedure_id.clone(),
            code: None,
            name: record.service_name.clone(),
            display_name: normalized.display_name.clone(),
            category: None,
            description: None,
            normalized_tags: normalized.normalized_tags.clone(),
            is_active: true,
            created_at: existing_procedure.map(|p| p.created_at).unwrap_or(now),
            updated_at: now,
        };
        self.procedures.upsert_by_code_or_name(procedure).await?;

        let facility_procedure = FacilityProcedure {
            id: format!("{facility_id}:{procedure_id}"),
            facility_id: facility_id.clone(),
            procedure_id: procedure_id.clone(),
            price: record.price,
            currency: record.currency.clone(),
            estimated_duration_minutes: record.estimated_duration_minutes,
            is_available: record.is_available.unwrap_or(true),
        };
        self.facility_procedures.upsert(facility_procedure).await?;

        self.enqueue_enrichment_if_needed(&procedure_id).await?;

        let tags: Vec<String> = normalized.normalized_tags.iter().cloned().collect();
        if let Err(err) = self.search.upsert(&saved_facility, tags, Vec::new()).await {
            tracing::warn!(facility_id = %facility_id, error = %err, "search index upsert failed, store remains the truth");
        }

        self.idempotency.record(idempotency_key, self.config.provider_ingestion_idempotency_ttl_minutes).await?;

        Ok(Some(RecordOutcome { facility_created, procedure_created }))
    }

    /// The address/geocode priority ladder. This ordering is a hard
    /// correctness invariant: coordinates beat a structured address, a
    /// structured address beats tag inference, and tag inference never
    /// extends a query already built from real address fields.
    async fn resolve_location(&self, record: &ProviderRecord) -> (Address, GeoPoint) {
        let mut address = Address {
            street: record.street.clone().unwrap_or_default(),
            city: record.city.clone().unwrap_or_default(),
            state: record.state.clone().unwrap_or_default(),
            country: record.country.clone().unwrap_or_default(),
        };

        if let Some(location) = GeoPoint::known(record.lat.unwrap_or(0.0), record.lon.unwrap_or(0.0)) {
            if address.city.is_empty() || address.state.is_empty() || address.country.is_empty() {
                match self.geo.reverse_geocode(location).await {
                    Ok(reverse) => {
                        if address.city.is_empty() {
                            address.city = reverse.city;
                        }
                        if address.state.is_empty() {
                            address.state = reverse.state;
                        }
                        if address.country.is_empty() {
                            address.country = reverse.country;
                        }
                    }
                    Err(err) => tracing::debug!(error = %err, "reverse geocode failed, keeping partial address"),
                }
            }
            return (address, location);
        }

        if address.is_usable() {
            let query = build_address_query(&address);
            match self.geo.geocode(&query).await {
                Ok(geocoded) => {
                    if address.city.is_empty() {
                        address.city = geocoded.city;
                    }
                    if address.state.is_empty() {
                        address.state = geocoded.state;
                    }
                    if address.country.is_empty() {
                        address.country = geocoded.country;
                    }
                    return (address, geocoded.location);
                }
                Err(err) => {
                    tracing::debug!(query, error = %err, "geocode failed, storing without coordinates");
                    return (address, GeoPoint::UNKNOWN);
                }
            }
        }

        if let Some(region) = infer_region_from_tags(&record.tags) {
            if address.city.is_empty() {
                address.city = region.city;
            }
            if address.state.is_empty() {
                address.state = region.state;
            }
        }
        (address, GeoPoint::UNKNOWN)
    }

    async fn enqueue_enrichment_if_needed(&self, procedure_id: &ProcedureId) -> CoreResult<()> {
        let existing = self.enrichments.get(procedure_id).await?;
        let needs_enrichment = match &existing {
            None => true,
            Some(enrichment) => {
                enrichment.enrichment_version < self.config.enrichment_target_version
                    || (enrichment.status == EnrichmentStatus::Failed && enrichment.retry_count < self.config.enrichment_retry_cap)
            }
        };

        // A stale-but-present row is already visible to `enrichment_candidates`;
        // only a wholly absent row needs a placeholder written so a worker has
        // something to pull.
        if needs_enrichment && existing.is_none() {
            self.enrichments
                .upsert(ProcedureEnrichment {
                    procedure_id: procedure_id.clone(),
                    description: None,
                    prep_steps: Vec::new(),
                    risks: Vec::new(),
                    recovery: None,
                    search_concepts: Vec::new(),
                    provider_identifier: None,
                    model_identifier: None,
                    status: EnrichmentStatus::Pending,
                    enrichment_version: -1,
                    retry_count: 0,
                    last_error: None,
                })
                .await?;
        }
        Ok(())
    }
}

/// Builds a geocoder query string from real address fields only, in
/// street/city/state/country order, skipping empty components.
fn build_address_query(address: &Address) -> String {
    [&address.street, &address.city, &address.state, &address.country]
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use carepoint_core::capability::{GeocodeResult, ReverseGeocodeResult};
    use carepoint_core::error::{GeoError, SearchIndexError, StoreError};
    use carepoint_core::model::SearchDocument;
    use carepoint_core::query::{FacilityListFilter, SearchParams};
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    struct FakeFacilities {
        rows: StdMutex<HashMap<FacilityId, Facility>>,
    }

    #[async_trait]
    impl FacilityRepository for FakeFacilities {
        async fn get_by_id(&self, id: &FacilityId) -> Result<Option<Facility>, StoreError> {
            Ok(self.rows.lock().unwrap().get(id).cloned())
        }
        async fn get_by_ids(&self, ids: &[FacilityId]) -> Result<Vec<Facility>, StoreError> {
            let rows = self.rows.lock().unwrap();
            Ok(ids.iter().filter_map(|id| rows.get(id).cloned()).collect())
        }
        async fn list(&self, _filter: &FacilityListFilter) -> Result<Vec<Facility>, StoreError> {
            Ok(self.rows.lock().unwrap().values().cloned().collect())
        }
        async fn search_with_count(&self, _params: &SearchParams) -> Result<(Vec<Facility>, u64), StoreError> {
            Ok((Vec::new(), 0))
        }
        async fn create(&self, facility: Facility) -> Result<Facility, StoreError> {
            self.rows.lock().unwrap().insert(facility.id.clone(), facility.clone());
            Ok(facility)
        }
        async fn update(&self, facility: Facility) -> Result<Facility, StoreError> {
            self.rows.lock().unwrap().insert(facility.id.clone(), facility.clone());
            Ok(facility)
        }
        async fn delete(&self, id: &FacilityId) -> Result<(), StoreError> {
            self.rows.lock().unwrap().remove(id);
            Ok(())
        }
        async fn top_facilities(&self, n: u32) -> Result<Vec<Facility>, StoreError> {
            Ok(self.rows.lock().unwrap().values().take(n as usize).cloned().collect())
        }
    }

    struct FakeProcedures {
        rows: StdMutex<HashMap<ProcedureId, Procedure>>,
    }

    #[async_trait]
    impl ProcedureRepository for FakeProcedures {
        async fn upsert_by_code_or_name(&self, procedure: Procedure) -> Result<Procedure, StoreError> {
            self.rows.lock().unwrap().insert(procedure.id.clone(), procedure.clone());
            Ok(procedure)
        }
        async fn get_by_id(&self, id: &ProcedureId) -> Result<Option<Procedure>, StoreError> {
            Ok(self.rows.lock().unwrap().get(id).cloned())
        }
        async fn enrichment_candidates(&self, _target_version: i32, _retry_cap: u32) -> Result<Vec<Procedure>, StoreError> {
            Ok(self.rows.lock().unwrap().values().cloned().collect())
        }
    }

    struct FakeFacilityProcedures {
        rows: StdMutex<Vec<FacilityProcedure>>,
    }

    #[async_trait]
    impl FacilityProcedureRepository for FakeFacilityProcedures {
        async fn upsert(&self, row: FacilityProcedure) -> Result<FacilityProcedure, StoreError> {
            self.rows.lock().unwrap().push(row.clone());
            Ok(row)
        }
    }

    struct FakeEnrichments {
        rows: StdMutex<HashMap<ProcedureId, ProcedureEnrichment>>,
    }

    #[async_trait]
    impl EnrichmentRepository for FakeEnrichments {
        async fn upsert(&self, enrichment: ProcedureEnrichment) -> Result<ProcedureEnrichment, StoreError> {
            self.rows.lock().unwrap().insert(enrichment.procedure_id.clone(), enrichment.clone());
            Ok(enrichment)
        }
        async fn get(&self, procedure_id: &ProcedureId) -> Result<Option<ProcedureEnrichment>, StoreError> {
            Ok(self.rows.lock().unwrap().get(procedure_id).cloned())
        }
    }

    #[derive(Default)]
    struct FakeIdempotency {
        seen: StdMutex<HashSet<String>>,
    }

    #[async_trait]
    impl IdempotencyStore for FakeIdempotency {
        async fn contains(&self, key: &IdempotencyKey) -> Result<bool, StoreError> {
            Ok(self.seen.lock().unwrap().contains(key.as_str()))
        }
        async fn record(&self, key: IdempotencyKey, _ttl_minutes: u32) -> Result<(), StoreError> {
            self.seen.lock().unwrap().insert(key.as_str().to_string());
            Ok(())
        }
    }

    struct NoopSearch;

    #[async_trait]
    impl SearchAdapter for NoopSearch {
        async fn ensure_schema(&self) -> Result<(), SearchIndexError> {
            Ok(())
        }
        async fn upsert(&self, _facility: &Facility, _tags: Vec<String>, _insurance: Vec<String>) -> Result<(), SearchIndexError> {
            Ok(())
        }
        async fn delete(&self, _id: &FacilityId) -> Result<(), SearchIndexError> {
            Ok(())
        }
        async fn search(&self, _params: &SearchParams) -> Result<(Vec<SearchDocument>, u64), SearchIndexError> {
            Ok((Vec::new(), 0))
        }
        async fn suggest(&self, _query: &str, _location: Option<GeoPoint>, _limit: u32) -> Result<Vec<SearchDocument>, SearchIndexError> {
            Ok(Vec::new())
        }
    }

    struct NoopGeo;

    #[async_trait]
    impl GeoProvider for NoopGeo {
        async fn geocode(&self, _query: &str) -> Result<GeocodeResult, GeoError> {
            Err(GeoError::NoMatch { query: "unused in these tests".into() })
        }
        async fn reverse_geocode(&self, _point: GeoPoint) -> Result<ReverseGeocodeResult, GeoError> {
            Ok(ReverseGeocodeResult::default())
        }
    }

    /// Records the last query string it received so the address-ladder
    /// tests can assert on exactly what was built.
    struct RecordingGeo {
        last_query: StdMutex<Option<String>>,
    }

    #[async_trait]
    impl GeoProvider for RecordingGeo {
        async fn geocode(&self, query: &str) -> Result<GeocodeResult, GeoError> {
            *self.last_query.lock().unwrap() = Some(query.to_string());
            Ok(GeocodeResult { location: GeoPoint { lat: 4.8156, lon: 7.0498 }, city: "Port Harcourt".into(), state: "Rivers".into(), country: "Nigeria".into() })
        }
        async fn reverse_geocode(&self, _point: GeoPoint) -> Result<ReverseGeocodeResult, GeoError> {
            Ok(ReverseGeocodeResult::default())
        }
    }

    struct SingleRecordProvider {
        record: Mutex<Option<ProviderRecord>>,
    }

    #[async_trait]
    impl ProviderDataSource for SingleRecordProvider {
        async fn list_records(&self, _provider_id: &str, cursor: Option<&str>) -> Result<carepoint_core::capability::ProviderPage, ProviderError> {
            if cursor.is_some() {
                return Ok((Vec::new(), None));
            }
            let record = self.record.lock().unwrap().clone();
            Ok((record.into_iter().collect(), None))
        }
    }

    fn build_coordinator(geo: Arc<dyn GeoProvider>, provider: Arc<dyn ProviderDataSource>) -> IngestionCoordinator {
        IngestionCoordinator::new(
            provider,
            Arc::new(FakeFacilities { rows: StdMutex::new(HashMap::new()) }),
            Arc::new(FakeProcedures { rows: StdMutex::new(HashMap::new()) }),
            Arc::new(FakeFacilityProcedures { rows: StdMutex::new(Vec::new()) }),
            Arc::new(FakeEnrichments { rows: StdMutex::new(HashMap::new()) }),
            Arc::new(FakeIdempotency::default()),
            Arc::new(NoopSearch),
            geo,
            Arc::new(NormalizationTables::built_in()),
            IngestConfig::for_testing(),
        )
    }

    fn abbreviation_record() -> ProviderRecord {
        ProviderRecord {
            external_id: "rec-1".into(),
            facility_external_id: "F1".into(),
            facility_name: "City Hospital".into(),
            service_name: "C/S".into(),
            price: 50000.0,
            currency: "NGN".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn abbreviation_ingest_scenario_produces_caesarean_procedure() {
        let provider = Arc::new(SingleRecordProvider { record: Mutex::new(Some(abbreviation_record())) });
        let coordinator = build_coordinator(Arc::new(NoopGeo), provider);

        let summary = coordinator.sync_current_data("provider-1").await.unwrap();
        assert_eq!(summary.facilities_created, 1);
        assert_eq!(summary.procedures_created, 1);
        assert_eq!(summary.record_errors, 0);

        let procedure_id = ProcedureId::derive(None, "caesarean section");
        let stored = coordinator.procedures.get_by_id(&procedure_id).await.unwrap().unwrap();
        assert!(stored.display_name.contains("Caesarean Section"));
        assert!(stored.normalized_tags.contains("caesarean_section"));
        assert_eq!(stored.name, "C/S");
    }

    #[tokio::test]
    async fn port_harcourt_scenario_never_appends_tag_region() {
        let record = ProviderRecord {
            external_id: "rec-2".into(),
            facility_external_id: "F2".into(),
            facility_name: "PH Clinic".into(),
            service_name: "Antenatal Care".into(),
            price: 10000.0,
            currency: "NGN".into(),
            city: Some("Port Harcourt".into()),
            state: Some("Rivers".into()),
            tags: vec!["lagos".into()],
            lat: Some(0.0),
            lon: Some(0.0),
            ..Default::default()
        };
        let geo = Arc::new(RecordingGeo { last_query: StdMutex::new(None) });
        let provider = Arc::new(SingleRecordProvider { record: Mutex::new(Some(record)) });
        let coordinator = build_coordinator(geo.clone(), provider);

        coordinator.sync_current_data("provider-2").await.unwrap();

        assert_eq!(geo.last_query.lock().unwrap().as_deref(), Some("Port Harcourt, Rivers"));

        let facility_id = FacilityId::derive("provider-2", "F2", "ph clinic");
        let stored = coordinator.facilities.get_by_id(&facility_id).await.unwrap().unwrap();
        assert_eq!(stored.address.city, "Port Harcourt");
    }

    #[tokio::test]
    async fn reingesting_same_page_is_idempotent() {
        let provider = Arc::new(SingleRecordProvider { record: Mutex::new(Some(abbreviation_record())) });
        let coordinator = build_coordinator(Arc::new(NoopGeo), provider);

        let first = coordinator.sync_current_data("provider-3").await.unwrap();
        assert_eq!(first.facilities_created, 1);
        assert_eq!(first.procedures_created, 1);

        let second = coordinator.sync_current_data("provider-3").await.unwrap();
        assert_eq!(second.facilities_created, 0);
        assert_eq!(second.procedures_created, 0);
        assert_eq!(second.records_skipped_idempotent, 1);
    }

    #[test]
    fn address_query_skips_empty_components() {
        let address = Address { street: String::new(), city: "Lagos".into(), state: "Lagos".into(), country: String::new() };
        assert_eq!(build_address_query(&address), "Lagos, Lagos");
    }

    #[test]
    fn address_query_handles_fully_empty_address() {
        assert_eq!(build_address_query(&Address::default()), "");
    }
}
