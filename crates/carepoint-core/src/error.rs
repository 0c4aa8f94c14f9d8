//! The error hierarchy shared by every Carepoint crate.
//!
//! The core distinguishes error *kinds*, not type names: `NotFound`,
//! `ValidationError`, `ConflictError`, `Unavailable`, `Transient`, and
//! `Fatal`. Each concern (store, cache, search, geocoding, enrichment,
//! ingestion, resolution) gets its own `thiserror` enum so call sites can
//! match on the specific failure; [`CoreError`] aggregates them with
//! `#[from]` the way a top-level error type should, without collapsing the
//! distinctions into a string.

use thiserror::Error;

/// The aggregate error type for cross-cutting code (the ingestion
/// coordinator, the query resolver) that can fail in any subsystem.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Search(#[from] SearchIndexError),

    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error(transparent)]
    Enrichment(#[from] EnrichmentError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("operation aborted: {0}")]
    Cancelled(String),
}

/// Result alias used throughout the workspace.
pub type CoreResult<T> = Result<T, CoreError>;

/// Caller-provided parameters violate the contract: empty id, NaN
/// pagination, limit out of range, negative radius. Surfaced directly,
/// never masked as a server error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("limit must be between 1 and {max}, got {actual}")]
    LimitOutOfRange { actual: i64, max: i64 },

    #[error("offset must be >= 0, got {actual}")]
    NegativeOffset { actual: i64 },

    #[error("radius_km must be >= 0, got {actual}")]
    NegativeRadius { actual: f64 },

    #[error("field must not be NaN: {field}")]
    NotANumber { field: &'static str },

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
}

/// Errors from the transactional store (`carepoint-store`).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Upsert uniqueness violation detected after a read-modify-write race.
    /// Callers retry once; if it recurs, it is surfaced.
    #[error("conflict writing {entity} {id}: {message}")]
    Conflict {
        entity: &'static str,
        id: String,
        message: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Timeouts and 5xx-equivalents. Retried with bounded backoff at the
    /// ingestion layer; never retried on the request path.
    #[error("transient store failure: {message}")]
    Transient { message: String },

    /// The store is temporarily unreachable. Reads degrade to a 5xx at the
    /// resolver (never a false empty result); ingestion records a
    /// per-record error and continues.
    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    #[error("unrecoverable store configuration error: {message}")]
    Fatal { message: String },
}

/// Errors from the cache store (`carepoint-cache`). Most call sites
/// degrade a [`CacheError`] to a miss rather than propagating it — see
/// `carepoint-cache`'s `CachedFacilityRepository`.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache unavailable: {message}")]
    Unavailable { message: String },

    #[error("failed to decode cached value for key {key}: {message}")]
    Decode { key: String, message: String },

    #[error("failed to encode value for key {key}: {message}")]
    Encode { key: String, message: String },
}

/// Errors from the search adapter (`carepoint-search`).
#[derive(Error, Debug)]
pub enum SearchIndexError {
    #[error("index write failed for facility {id}: {message}")]
    IndexWriteError { id: String, message: String },

    #[error("search index unavailable: {message}")]
    Unavailable { message: String },

    #[error("search query failed: {message}")]
    QueryFailed { message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Errors from the geolocation provider (`carepoint-geo`).
#[derive(Error, Debug)]
pub enum GeoError {
    #[error("geocoding provider unavailable: {message}")]
    Unavailable { message: String },

    #[error("geocoding request timed out")]
    Timeout,

    #[error("no geocoding match for query: {query}")]
    NoMatch { query: String },
}

/// Errors from the enrichment provider.
#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("enrichment provider unavailable: {message}")]
    Unavailable { message: String },

    #[error("enrichment request failed: {message}")]
    Failed { message: String },
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Decode {
            key: "<unknown>".to_string(),
            message: err.to_string(),
        }
    }
}
