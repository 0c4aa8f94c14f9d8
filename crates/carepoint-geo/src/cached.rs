//! Cache-backed decorator over any [`GeoProvider`].

use std::sync::Arc;

use async_trait::async_trait;
use carepoint_core::capability::{CacheStore, GeoProvider, GeocodeResult, ReverseGeocodeResult};
use carepoint_core::error::GeoError;
use carepoint_core::model::GeoPoint;
use sha2::{Digest, Sha256};

/// Geocode results change rarely; a long TTL keeps repeated ingestion of
/// the same address string from re-hitting the upstream provider.
const GEOCODE_TTL_SECONDS: u64 = 30 * 24 * 3600;

pub struct CachedGeoProvider {
    inner: Arc<dyn GeoProvider>,
    cache: Arc<dyn CacheStore>,
}

impl CachedGeoProvider {
    pub fn new(inner: Arc<dyn GeoProvider>, cache: Arc<dyn CacheStore>) -> Self {
        Self { inner, cache }
    }

    fn geocode_key(query: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(query.trim().to_lowercase().as_bytes());
        format!("geocode:{:x}", hasher.finalize())
    }
}

#[async_trait]
impl GeoProvider for CachedGeoProvider {
    async fn geocode(&self, query: &str) -> Result<GeocodeResult, GeoError> {
        let key = Self::geocode_key(query);
        if let Ok(Some(bytes)) = self.cache.get(&key).await {
            if let Ok(cached) = serde_json::from_slice::<CachedGeocode>(&bytes) {
                return Ok(cached.into());
            }
        }

        let result = self.inner.geocode(query).await?;
        if let Ok(bytes) = serde_json::to_vec(&CachedGeocode::from(&result)) {
            let _ = self.cache.set(&key, bytes, GEOCODE_TTL_SECONDS).await;
        }
        Ok(result)
    }

    /// Reverse geocoding is not cached: it is only used once per ingested
    /// record when coordinates are already known, so there
    /// is no repeated-query pattern worth caching.
    async fn reverse_geocode(&self, point: GeoPoint) -> Result<ReverseGeocodeResult, GeoError> {
        self.inner.reverse_geocode(point).await
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct CachedGeocode {
    lat: f64,
    lon: f64,
    city: String,
    state: String,
    country: String,
}

impl From<&GeocodeResult> for CachedGeocode {
    fn from(result: &GeocodeResult) -> Self {
        Self { lat: result.location.lat, lon: result.location.lon, city: result.city.clone(), state: result.state.clone(), country: result.country.clone() }
    }
}

impl From<CachedGeocode> for GeocodeResult {
    fn from(cached: CachedGeocode) -> Self {
        Self { location: GeoPoint { lat: cached.lat, lon: cached.lon }, city: cached.city, state: cached.state, country: cached.country }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct CountingProvider {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl GeoProvider for CountingProvider {
        async fn geocode(&self, _query: &str) -> Result<GeocodeResult, GeoError> {
            *self.calls.lock().unwrap() += 1;
            Ok(GeocodeResult { location: GeoPoint { lat: 6.5, lon: 3.3 }, city: "Lagos".into(), state: "Lagos".into(), country: "Nigeria".into() })
        }
        async fn reverse_geocode(&self, _point: GeoPoint) -> Result<ReverseGeocodeResult, GeoError> {
            Ok(ReverseGeocodeResult::default())
        }
    }

    struct InMemoryCache {
        entries: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl CacheStore for InMemoryCache {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, carepoint_core::error::CacheError> {
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }
        async fn set(&self, key: &str, value: Vec<u8>, _ttl_seconds: u64) -> Result<(), carepoint_core::error::CacheError> {
            self.entries.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }
        async fn delete(&self, key: &str) -> Result<(), carepoint_core::error::CacheError> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }
        async fn get_multi(&self, _keys: &[String]) -> Result<HashMap<String, Vec<u8>>, carepoint_core::error::CacheError> {
            Ok(HashMap::new())
        }
        async fn set_multi(&self, _entries: Vec<(String, Vec<u8>)>, _ttl_seconds: u64) -> Result<(), carepoint_core::error::CacheError> {
            Ok(())
        }
        async fn delete_pattern(&self, _glob: &str) -> Result<(), carepoint_core::error::CacheError> {
            Ok(())
        }
        async fn publish(&self, _channel: &str, _payload: Vec<u8>) -> Result<(), carepoint_core::error::CacheError> {
            Ok(())
        }
        async fn subscribe(&self, _channel: &str) -> Result<Box<dyn carepoint_core::capability::CacheSubscription>, carepoint_core::error::CacheError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn repeated_geocode_hits_cache_not_provider() {
        let provider = Arc::new(CountingProvider { calls: Mutex::new(0) });
        let cache = Arc::new(InMemoryCache { entries: Mutex::new(HashMap::new()) });
        let cached = CachedGeoProvider::new(provider.clone(), cache);

        cached.geocode("Port Harcourt, Rivers").await.unwrap();
        cached.geocode("Port Harcourt, Rivers").await.unwrap();

        assert_eq!(*provider.calls.lock().unwrap(), 1);
    }
}
