//! HTTP request handlers. Thin: the only validation done here is
//! rejecting a NaN lat/lon; limit, offset, and radius validation is left
//! to [`carepoint_resolver::QueryResolver`] so there is a single source of
//! truth for what makes a request invalid.

use axum::extract::{Path, Query, State};
use axum::Json;
use carepoint_core::ids::FacilityId;
use carepoint_core::model::GeoPoint;
use carepoint_resolver::{SearchFacilitiesRequest, SuggestedFacility};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::responses::{FacilityResponseBody, SearchResponseBody, SuggestResponseBody};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    #[serde(default)]
    pub radius_km: f64,
    pub insurance: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub session_id: Option<String>,
}

fn default_limit() -> i64 {
    20
}

fn location_from(lat: Option<f64>, lon: Option<f64>) -> ApiResult<Option<GeoPoint>> {
    match (lat, lon) {
        (Some(lat), Some(lon)) => {
            if lat.is_nan() {
                return Err(carepoint_core::error::ValidationError::NotANumber { field: "lat" }.into());
            }
            if lon.is_nan() {
                return Err(carepoint_core::error::ValidationError::NotANumber { field: "lon" }.into());
            }
            Ok(GeoPoint::known(lat, lon))
        }
        _ => Ok(None),
    }
}

pub async fn search_facilities(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> ApiResult<Json<SearchResponseBody>> {
    let location = location_from(query.lat, query.lon)?;

    let request = SearchFacilitiesRequest {
        raw_query: query.q,
        location,
        radius_km: query.radius_km,
        insurance: query.insurance,
        min_price: query.min_price,
        max_price: query.max_price,
        limit: query.limit,
        offset: query.offset,
        session_id: query.session_id,
    };

    let response = state.resolver().search_facilities(request).await?;
    Ok(Json(response.into()))
}

#[derive(Debug, Deserialize)]
pub struct SuggestQuery {
    #[serde(default)]
    pub q: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    #[serde(default = "default_suggest_limit")]
    pub limit: u32,
}

fn default_suggest_limit() -> u32 {
    5
}

pub async fn suggest_facilities(State(state): State<AppState>, Query(query): Query<SuggestQuery>) -> ApiResult<Json<SuggestResponseBody>> {
    let location = location_from(query.lat, query.lon)?;
    let suggestions: Vec<SuggestedFacility> = state.resolver().suggest(&query.q, location, query.limit).await?;
    Ok(Json(suggestions.into()))
}

pub async fn get_facility(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<FacilityResponseBody>> {
    let id = FacilityId::new(id);
    match state.resolver().get_facility(&id).await? {
        Some(facility) => Ok(Json(facility.into())),
        None => Err(carepoint_core::error::CoreError::Store(carepoint_core::error::StoreError::NotFound { entity: "facility", id: id.to_string() }).into()),
    }
}

pub async fn health() -> &'static str {
    "ok"
}
