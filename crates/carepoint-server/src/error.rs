//! Maps [`CoreError`] (and the validation errors raised directly by
//! extractors) onto HTTP responses.
//!
//! The request path never masks a store error as success, and an
//! unreachable backend is always a 5xx-equivalent so the caller can
//! retry — never a false empty result.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use carepoint_core::error::{CacheError, CoreError, EnrichmentError, GeoError, SearchIndexError, StoreError, ValidationError};

pub type ApiResult<T> = Result<T, ApiError>;

pub struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(CoreError::Validation(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = classify(&self.0);
        let body = serde_json::json!({
            "error": {
                "code": code,
                "message": message,
            }
        });
        (status, Json(body)).into_response()
    }
}

fn classify(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::Validation(validation) => (StatusCode::BAD_REQUEST, "validation_error", validation.to_string()),
        CoreError::Store(store) => classify_store(store),
        CoreError::Cache(cache) => classify_cache(cache),
        CoreError::Search(search) => classify_search(search),
        CoreError::Geo(geo) => classify_geo(geo),
        CoreError::Enrichment(enrichment) => classify_enrichment(enrichment),
        CoreError::Cancelled(message) => (StatusCode::SERVICE_UNAVAILABLE, "cancelled", message.clone()),
    }
}

fn classify_store(err: &StoreError) -> (StatusCode, &'static str, String) {
    match err {
        StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found", err.to_string()),
        StoreError::Conflict { .. } => (StatusCode::CONFLICT, "conflict", err.to_string()),
        StoreError::Validation(validation) => (StatusCode::BAD_REQUEST, "validation_error", validation.to_string()),
        StoreError::Transient { .. } => (StatusCode::SERVICE_UNAVAILABLE, "transient", err.to_string()),
        StoreError::Unavailable { .. } => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", err.to_string()),
        StoreError::Fatal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "fatal", err.to_string()),
    }
}

fn classify_cache(err: &CacheError) -> (StatusCode, &'static str, String) {
    (StatusCode::SERVICE_UNAVAILABLE, "cache_unavailable", err.to_string())
}

fn classify_search(err: &SearchIndexError) -> (StatusCode, &'static str, String) {
    match err {
        SearchIndexError::Validation(validation) => (StatusCode::BAD_REQUEST, "validation_error", validation.to_string()),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "search_unavailable", err.to_string()),
    }
}

fn classify_geo(err: &GeoError) -> (StatusCode, &'static str, String) {
    (StatusCode::SERVICE_UNAVAILABLE, "geo_unavailable", err.to_string())
}

fn classify_enrichment(err: &EnrichmentError) -> (StatusCode, &'static str, String) {
    (StatusCode::SERVICE_UNAVAILABLE, "enrichment_unavailable", err.to_string())
}
