//! Capability traits — the seams at which `carepoint-cache`,
//! `carepoint-search`, `carepoint-store`, `carepoint-geo`, and
//! `carepoint-normalize` plug into the ingestion coordinator and query
//! resolver.
//!
//! Every trait here is object-safe and constructed once, behind an
//! `Arc<dyn Trait>`, at process start (see `carepoint-server`). An optional
//! capability (query understanding, enrichment) is represented as
//! `Option<Arc<dyn Trait>>`, never as a nil check scattered through call
//! sites — absence is a value, not the absence of a check.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{CacheError, EnrichmentError, GeoError, SearchIndexError, StoreError};
use crate::ids::FacilityId;
use crate::model::{Facility, FacilityProcedure, FacilityWard, GeoPoint, Procedure, ProcedureEnrichment, SearchDocument};
use crate::query::{FacilityListFilter, QueryIntent, SearchParams, UnderstoodQuery};

// ---------------------------------------------------------------------
// Cache store
// ---------------------------------------------------------------------

/// An opaque key/value byte cache with TTLs, pipelined multi-key access,
/// pattern deletion, and pub/sub. Any operation may fail with
/// [`CacheError::Unavailable`]; callers treat that as a miss for reads and
/// a soft error for writes — a missing cache never blocks a request.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl_seconds: u64) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// MUST be pipelined: one round-trip, not one per key.
    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>, CacheError>;

    /// MUST be pipelined.
    async fn set_multi(&self, entries: Vec<(String, Vec<u8>)>, ttl_seconds: u64) -> Result<(), CacheError>;

    /// Removes every key matching `glob`. Implementations MUST bound memory
    /// use (iterative batches), not load every key at once.
    async fn delete_pattern(&self, glob: &str) -> Result<(), CacheError>;

    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), CacheError>;

    /// Returns a restartable subscription; reconnect behavior is the
    /// caller's responsibility (see `carepoint-cache`'s invalidation
    /// listener).
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn CacheSubscription>, CacheError>;
}

/// A live subscription to a pub/sub channel.
#[async_trait]
pub trait CacheSubscription: Send {
    /// Awaits the next payload, or `None` if the subscription was closed.
    async fn next_payload(&mut self) -> Option<Vec<u8>>;
}

// ---------------------------------------------------------------------
// Event bus
// ---------------------------------------------------------------------

/// A cache-invalidation notification, as published by the cached
/// repository decorator on every write.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind")]
pub enum InvalidationEvent {
    #[serde(rename = "facility_changed")]
    FacilityChanged {
        id: FacilityId,
        patterns: Vec<String>,
        origin: String,
    },
    #[serde(rename = "facilities_bulk_changed")]
    FacilitiesBulkChanged { patterns: Vec<String>, origin: String },
}

impl InvalidationEvent {
    pub fn origin(&self) -> &str {
        match self {
            InvalidationEvent::FacilityChanged { origin, .. } => origin,
            InvalidationEvent::FacilitiesBulkChanged { origin, .. } => origin,
        }
    }

    pub fn patterns(&self) -> &[String] {
        match self {
            InvalidationEvent::FacilityChanged { patterns, .. } => patterns,
            InvalidationEvent::FacilitiesBulkChanged { patterns, .. } => patterns,
        }
    }
}

/// A single pub/sub channel carrying [`InvalidationEvent`]s. A single-node
/// deployment MAY implement this atop an in-process broadcast channel
/// instead of cross-process pub/sub; the contract (origin tag, reconnect
/// recovery) is unchanged either way.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: InvalidationEvent) -> Result<(), CacheError>;

    async fn subscribe(&self) -> Result<Box<dyn EventSubscription>, CacheError>;
}

#[async_trait]
pub trait EventSubscription: Send {
    async fn next_event(&mut self) -> Option<InvalidationEvent>;
}

// ---------------------------------------------------------------------
// Transactional store
// ---------------------------------------------------------------------

/// The raw (uncached) facility repository. `carepoint-cache` wraps this
/// behind a read-through/write-invalidate decorator; the resolver never
/// talks to this trait directly except as a fallback.
#[async_trait]
pub trait FacilityRepository: Send + Sync {
    async fn get_by_id(&self, id: &FacilityId) -> Result<Option<Facility>, StoreError>;

    /// No ordering guarantee on the result; callers order by id.
    async fn get_by_ids(&self, ids: &[FacilityId]) -> Result<Vec<Facility>, StoreError>;

    async fn list(&self, filter: &FacilityListFilter) -> Result<Vec<Facility>, StoreError>;

    async fn search_with_count(&self, params: &SearchParams) -> Result<(Vec<Facility>, u64), StoreError>;

    async fn create(&self, facility: Facility) -> Result<Facility, StoreError>;

    async fn update(&self, facility: Facility) -> Result<Facility, StoreError>;

    async fn delete(&self, id: &FacilityId) -> Result<(), StoreError>;

    /// Facilities ordered for the cache warmer's "top N" pass.
    async fn top_facilities(&self, n: u32) -> Result<Vec<Facility>, StoreError>;
}

/// The procedure repository: upsert-by-code-then-name.
#[async_trait]
pub trait ProcedureRepository: Send + Sync {
    async fn upsert_by_code_or_name(&self, procedure: Procedure) -> Result<Procedure, StoreError>;

    async fn get_by_id(&self, id: &crate::ids::ProcedureId) -> Result<Option<Procedure>, StoreError>;

    /// Procedures whose enrichment is missing, stale, or eligible for
    /// retry (`enrichment_version < target`, or `status = failed` with
    /// `retry_count < cap`).
    async fn enrichment_candidates(&self, target_version: i32, retry_cap: u32) -> Result<Vec<Procedure>, StoreError>;
}

/// Unique on `(facility_id, procedure_id)`.
#[async_trait]
pub trait FacilityProcedureRepository: Send + Sync {
    async fn upsert(&self, row: FacilityProcedure) -> Result<FacilityProcedure, StoreError>;
}

#[async_trait]
pub trait EnrichmentRepository: Send + Sync {
    async fn upsert(&self, enrichment: ProcedureEnrichment) -> Result<ProcedureEnrichment, StoreError>;

    async fn get(&self, procedure_id: &crate::ids::ProcedureId) -> Result<Option<ProcedureEnrichment>, StoreError>;
}

/// Unique on `(facility_id, ward_name)`.
#[async_trait]
pub trait WardRepository: Send + Sync {
    async fn upsert(&self, ward: FacilityWard) -> Result<FacilityWard, StoreError>;
}

/// Backs the ingestion idempotency check.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Returns `true` if this key has already been recorded (and has not
    /// expired).
    async fn contains(&self, key: &crate::ids::IdempotencyKey) -> Result<bool, StoreError>;

    async fn record(&self, key: crate::ids::IdempotencyKey, ttl_minutes: u32) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------
// Search adapter
// ---------------------------------------------------------------------

#[async_trait]
pub trait SearchAdapter: Send + Sync {
    /// Creates the collection with the fixed schema if it doesn't already
    /// exist. A later schema change requires out-of-band reindexing; this
    /// method never mutates an existing schema.
    async fn ensure_schema(&self) -> Result<(), SearchIndexError>;

    async fn upsert(&self, facility: &Facility, tags: Vec<String>, insurance: Vec<String>) -> Result<(), SearchIndexError>;

    /// Absence is not an error.
    async fn delete(&self, id: &FacilityId) -> Result<(), SearchIndexError>;

    async fn search(&self, params: &SearchParams) -> Result<(Vec<SearchDocument>, u64), SearchIndexError>;

    async fn suggest(&self, query: &str, location: Option<GeoPoint>, limit: u32) -> Result<Vec<SearchDocument>, SearchIndexError>;
}

// ---------------------------------------------------------------------
// Geolocation provider
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct GeocodeResult {
    pub location: GeoPoint,
    pub city: String,
    pub state: String,
    pub country: String,
}

#[derive(Debug, Clone, Default)]
pub struct ReverseGeocodeResult {
    pub city: String,
    pub state: String,
    pub country: String,
}

#[async_trait]
pub trait GeoProvider: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<GeocodeResult, GeoError>;

    async fn reverse_geocode(&self, point: GeoPoint) -> Result<ReverseGeocodeResult, GeoError>;
}

// ---------------------------------------------------------------------
// Enrichment provider
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct EnrichmentContext {
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentOutput {
    pub description: String,
    pub prep_steps: Vec<String>,
    pub risks: Vec<String>,
    pub recovery: String,
    pub search_concepts: Vec<String>,
}

#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    async fn enrich(&self, procedure_name: &str, context: &EnrichmentContext) -> Result<EnrichmentOutput, EnrichmentError>;

    /// The model/provider identifier stamped into the enrichment row.
    fn model_identifier(&self) -> &str;
}

// ---------------------------------------------------------------------
// Provider data source — re-exported here for a single import path
// ---------------------------------------------------------------------

pub use crate::provider::{ProviderError, ProviderPage, ProviderRecord};

#[async_trait]
pub trait ProviderDataSource: Send + Sync {
    async fn list_records(&self, provider_id: &str, cursor: Option<&str>) -> Result<ProviderPage, ProviderError>;
}

// ---------------------------------------------------------------------
// Query understanding — optional capability
// ---------------------------------------------------------------------

/// Pure function from a raw query to normalized terms/synonyms/intent.
/// When disabled (missing config), resolvers fall through to
/// [`UnderstoodQuery::raw_fallback`] instead of holding `None` scattered
/// through call sites — see `carepoint-resolver`.
pub trait QueryUnderstanding: Send + Sync {
    fn understand(&self, raw_query: &str) -> UnderstoodQuery;
}

// ---------------------------------------------------------------------
// Ranker
// ---------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RankContext {
    pub terms: Vec<String>,
    pub intent: QueryIntent,
    pub confidence: f64,
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RankedFacility {
    pub document: SearchDocument,
    pub score: f64,
}

/// Pure function from `(candidates, query context)` to an ordered list
/// with scores. Stable tie-break: `(score desc, rating desc, review_count
/// desc, id asc)` — see `carepoint-resolver`'s default implementation.
pub trait Ranker: Send + Sync {
    fn rank(&self, candidates: Vec<SearchDocument>, context: &RankContext) -> Vec<RankedFacility>;
}
