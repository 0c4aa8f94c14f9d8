//! HTTP-backed [`GeoProvider`]. Talks to any Nominatim-compatible
//! geocoding endpoint; the exact provider is an implementation detail behind
//! the capability boundary.

use std::time::Duration;

use async_trait::async_trait;
use carepoint_core::capability::{GeoProvider, GeocodeResult, ReverseGeocodeResult};
use carepoint_core::error::GeoError;
use carepoint_core::model::GeoPoint;
use serde::Deserialize;

/// Geocoding timeouts should stay short; callers fall through the
/// address-resolution ladder on failure rather than blocking.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

pub struct HttpGeoProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGeoProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().expect("reqwest client builder is infallible here");
        Self { client, base_url: base_url.into() }
    }
}

#[derive(Debug, Deserialize)]
struct ForwardResult {
    lat: String,
    lon: String,
    #[serde(default)]
    address: ForwardAddress,
}

#[derive(Debug, Default, Deserialize)]
struct ForwardAddress {
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    town: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReverseResult {
    #[serde(default)]
    address: ForwardAddress,
}

#[async_trait]
impl GeoProvider for HttpGeoProvider {
    async fn geocode(&self, query: &str) -> Result<GeocodeResult, GeoError> {
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("format", "jsonv2"), ("addressdetails", "1"), ("limit", "1")])
            .send()
            .await
            .map_err(map_request_error)?;

        let results: Vec<ForwardResult> = response.json().await.map_err(|err| GeoError::Unavailable { message: err.to_string() })?;
        let top = results.into_iter().next().ok_or_else(|| GeoError::NoMatch { query: query.to_string() })?;

        let lat: f64 = top.lat.parse().map_err(|_| GeoError::Unavailable { message: "non-numeric latitude in response".into() })?;
        let lon: f64 = top.lon.parse().map_err(|_| GeoError::Unavailable { message: "non-numeric longitude in response".into() })?;

        Ok(GeocodeResult {
            location: GeoPoint { lat, lon },
            city: top.address.city.or(top.address.town).unwrap_or_default(),
            state: top.address.state.unwrap_or_default(),
            country: top.address.country.unwrap_or_default(),
        })
    }

    async fn reverse_geocode(&self, point: GeoPoint) -> Result<ReverseGeocodeResult, GeoError> {
        let response = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[("lat", point.lat.to_string()), ("lon", point.lon.to_string()), ("format", "jsonv2".to_string())])
            .send()
            .await
            .map_err(map_request_error)?;

        let result: ReverseResult = response.json().await.map_err(|err| GeoError::Unavailable { message: err.to_string() })?;
        Ok(ReverseGeocodeResult {
            city: result.address.city.or(result.address.town).unwrap_or_default(),
            state: result.address.state.unwrap_or_default(),
            country: result.address.country.unwrap_or_default(),
        })
    }
}

fn map_request_error(err: reqwest::Error) -> GeoError {
    if err.is_timeout() {
        GeoError::Timeout
    } else {
        GeoError::Unavailable { message: err.to_string() }
    }
}
