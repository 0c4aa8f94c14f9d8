//! The cache-aside repository decorator.
//!
//! Wraps a raw [`FacilityRepository`] with transparent read-through caching
//! and write-invalidation. Cache fills are fire-and-forget: a slow or failed
//! cache write never delays or fails the caller's request.

use std::sync::Arc;

use async_trait::async_trait;
use carepoint_core::capability::{CacheStore, EventBus, FacilityRepository, InvalidationEvent};
use carepoint_core::error::StoreError;
use carepoint_core::ids::FacilityId;
use carepoint_core::model::Facility;
use carepoint_core::query::{stable_params_hash, FacilityListFilter, SearchParams};

const FACILITY_TTL_SECONDS: u64 = 300;
const LIST_TTL_SECONDS: u64 = 180;
const SEARCH_TTL_SECONDS: u64 = 120;

/// Cache-aside decorator over the transactional facility repository.
///
/// `node_id` tags every invalidation event this process emits, so the
/// listener on this same process can ignore its own writes.
pub struct CachedFacilityRepository {
    store: Arc<dyn FacilityRepository>,
    cache: Arc<dyn CacheStore>,
    events: Arc<dyn EventBus>,
    node_id: String,
}

impl CachedFacilityRepository {
    pub fn new(store: Arc<dyn FacilityRepository>, cache: Arc<dyn CacheStore>, events: Arc<dyn EventBus>, node_id: impl Into<String>) -> Self {
        Self { store, cache, events, node_id: node_id.into() }
    }

    fn facility_key(id: &FacilityId) -> String {
        format!("facility:{id}")
    }

    fn list_key(filter: &FacilityListFilter) -> String {
        format!(
            "facilities:list:{}:{}:{}",
            filter.facility_type.as_deref().unwrap_or("*"),
            filter.limit,
            filter.offset
        )
    }

    fn search_count_key(params: &SearchParams) -> String {
        format!("facilities:search:count:{}", stable_params_hash(params))
    }

    fn spawn_set(&self, key: String, value: Vec<u8>, ttl_seconds: u64) {
        let cache = self.cache.clone();
        tokio::spawn(async move {
            if let Err(err) = cache.set(&key, value, ttl_seconds).await {
                tracing::debug!(key, error = %err, "cache fill failed, next request will refill");
            }
        });
    }

    fn spawn_set_multi(&self, entries: Vec<(String, Vec<u8>)>, ttl_seconds: u64) {
        if entries.is_empty() {
            return;
        }
        let cache = self.cache.clone();
        tokio::spawn(async move {
            if let Err(err) = cache.set_multi(entries, ttl_seconds).await {
                tracing::debug!(error = %err, "cache multi-fill failed, next request will refill");
            }
        });
    }

    /// Invalidates local cache keys for `id` and fires a best-effort event
    /// so other replicas converge. A publish failure is logged and
    /// swallowed: the store write already succeeded and is the source of
    /// truth.
    async fn invalidate_and_notify(&self, id: Option<&FacilityId>) {
        let patterns = vec!["facilities:list:*".to_string(), "facilities:search:*".to_string()];

        if let Some(id) = id {
            if let Err(err) = self.cache.delete(&Self::facility_key(id)).await {
                tracing::warn!(%id, error = %err, "cache invalidation delete failed");
            }
        }
        for pattern in &patterns {
            if let Err(err) = self.cache.delete_pattern(pattern).await {
                tracing::warn!(pattern, error = %err, "cache invalidation delete_pattern failed");
            }
        }

        let event = match id {
            Some(id) => InvalidationEvent::FacilityChanged { id: id.clone(), patterns, origin: self.node_id.clone() },
            None => InvalidationEvent::FacilitiesBulkChanged { patterns, origin: self.node_id.clone() },
        };
        if let Err(err) = self.events.publish(event).await {
            tracing::warn!(error = %err, "failed to publish cache-invalidation event");
        }
    }
}

#[async_trait]
impl FacilityRepository for CachedFacilityRepository {
    async fn get_by_id(&self, id: &FacilityId) -> Result<Option<Facility>, StoreError> {
        let key = Self::facility_key(id);
        match self.cache.get(&key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<Facility>(&bytes) {
                Ok(facility) => return Ok(Some(facility)),
                Err(err) => tracing::debug!(%id, error = %err, "cache decode failure treated as miss"),
            },
            Ok(None) => {}
            Err(err) => tracing::debug!(%id, error = %err, "cache unavailable, reading through to store"),
        }

        let facility = self.store.get_by_id(id).await?;
        if let Some(facility) = &facility {
            if let Ok(bytes) = serde_json::to_vec(facility) {
                self.spawn_set(key, bytes, FACILITY_TTL_SECONDS);
            }
        }
        Ok(facility)
    }

    async fn get_by_ids(&self, ids: &[FacilityId]) -> Result<Vec<Facility>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = ids.iter().map(Self::facility_key).collect();
        let cached = self.cache.get_multi(&keys).await.unwrap_or_default();

        let mut results = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for id in ids {
            match cached.get(&Self::facility_key(id)).and_then(|bytes| serde_json::from_slice::<Facility>(bytes).ok()) {
                Some(facility) => results.push(facility),
                None => missing.push(id.clone()),
            }
        }

        if !missing.is_empty() {
            let fetched = self.store.get_by_ids(&missing).await?;
            let fill_entries: Vec<(String, Vec<u8>)> = fetched
                .iter()
                .filter_map(|facility| serde_json::to_vec(facility).ok().map(|bytes| (Self::facility_key(&facility.id), bytes)))
                .collect();
            self.spawn_set_multi(fill_entries, FACILITY_TTL_SECONDS);
            results.extend(fetched);
        }

        Ok(results)
    }

    async fn list(&self, filter: &FacilityListFilter) -> Result<Vec<Facility>, StoreError> {
        let key = Self::list_key(filter);
        if let Ok(Some(bytes)) = self.cache.get(&key).await {
            if let Ok(facilities) = serde_json::from_slice::<Vec<Facility>>(&bytes) {
                return Ok(facilities);
            }
        }

        let facilities = self.store.list(filter).await?;
        if let Ok(bytes) = serde_json::to_vec(&facilities) {
            self.spawn_set(key, bytes, LIST_TTL_SECONDS);
        }
        Ok(facilities)
    }

    async fn search_with_count(&self, params: &SearchParams) -> Result<(Vec<Facility>, u64), StoreError> {
        let key = Self::search_count_key(params);
        if let Ok(Some(bytes)) = self.cache.get(&key).await {
            if let Ok(result) = serde_json::from_slice::<(Vec<Facility>, u64)>(&bytes) {
                return Ok(result);
            }
        }

        let result = self.store.search_with_count(params).await?;
        if let Ok(bytes) = serde_json::to_vec(&result) {
            self.spawn_set(key, bytes, SEARCH_TTL_SECONDS);
        }
        Ok(result)
    }

    async fn create(&self, facility: Facility) -> Result<Facility, StoreError> {
        let created = self.store.create(facility).await?;
        self.invalidate_and_notify(Some(&created.id)).await;
        Ok(created)
    }

    async fn update(&self, facility: Facility) -> Result<Facility, StoreError> {
        let updated = self.store.update(facility).await?;
        self.invalidate_and_notify(Some(&updated.id)).await;
        Ok(updated)
    }

    async fn delete(&self, id: &FacilityId) -> Result<(), StoreError> {
        self.store.delete(id).await?;
        self.invalidate_and_notify(Some(id)).await;
        Ok(())
    }

    async fn top_facilities(&self, n: u32) -> Result<Vec<Facility>, StoreError> {
        self.store.top_facilities(n).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use carepoint_core::model::{Address, GeoPoint};
    use chrono::Utc;

    struct FakeStore {
        facilities: Mutex<Vec<Facility>>,
        get_calls: Mutex<u32>,
    }

    #[async_trait]
    impl FacilityRepository for FakeStore {
        async fn get_by_id(&self, id: &FacilityId) -> Result<Option<Facility>, StoreError> {
            *self.get_calls.lock().unwrap() += 1;
            Ok(self.facilities.lock().unwrap().iter().find(|f| &f.id == id).cloned())
        }
        async fn get_by_ids(&self, ids: &[FacilityId]) -> Result<Vec<Facility>, StoreError> {
            let all = self.facilities.lock().unwrap();
            Ok(all.iter().filter(|f| ids.contains(&f.id)).cloned().collect())
        }
        async fn list(&self, _filter: &FacilityListFilter) -> Result<Vec<Facility>, StoreError> {
            Ok(self.facilities.lock().unwrap().clone())
        }
        async fn search_with_count(&self, _params: &SearchParams) -> Result<(Vec<Facility>, u64), StoreError> {
            let all = self.facilities.lock().unwrap().clone();
            let count = all.len() as u64;
            Ok((all, count))
        }
        async fn create(&self, facility: Facility) -> Result<Facility, StoreError> {
            self.facilities.lock().unwrap().push(facility.clone());
            Ok(facility)
        }
        async fn update(&self, facility: Facility) -> Result<Facility, StoreError> {
            Ok(facility)
        }
        async fn delete(&self, _id: &FacilityId) -> Result<(), StoreError> {
            Ok(())
        }
        async fn top_facilities(&self, n: u32) -> Result<Vec<Facility>, StoreError> {
            Ok(self.facilities.lock().unwrap().iter().take(n as usize).cloned().collect())
        }
    }

    struct InMemoryCache {
        entries: Mutex<std::collections::HashMap<String, Vec<u8>>>,
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
        async fn get_multi(&self, keys: &[String]) -> Result<std::collections::HashMap<String, Vec<u8>>, carepoint_core::error::CacheError> {
            let entries = self.entries.lock().unwrap();
            Ok(keys.iter().filter_map(|k| entries.get(k).map(|v| (k.clone(), v.clone()))).collect())
        }
        async fn set_multi(&self, entries: Vec<(String, Vec<u8>)>, _ttl_seconds: u64) -> Result<(), carepoint_core::error::CacheError> {
            let mut store = self.entries.lock().unwrap();
            for (k, v) in entries {
                store.insert(k, v);
            }
            Ok(())
        }
        async fn delete_pattern(&self, glob: &str) -> Result<(), carepoint_core::error::CacheError> {
            let prefix = glob.trim_end_matches('*');
            self.entries.lock().unwrap().retain(|k, _| !k.starts_with(prefix));
            Ok(())
        }
        async fn publish(&self, _channel: &str, _payload: Vec<u8>) -> Result<(), carepoint_core::error::CacheError> {
            Ok(())
        }
        async fn subscribe(&self, _channel: &str) -> Result<Box<dyn carepoint_core::capability::CacheSubscription>, carepoint_core::error::CacheError> {
            unimplemented!("not exercised in decorator tests")
        }
    }

    struct NoopEventBus;

    #[async_trait]
    impl EventBus for NoopEventBus {
        async fn publish(&self, _event: InvalidationEvent) -> Result<(), carepoint_core::error::CacheError> {
            Ok(())
        }
        async fn subscribe(&self) -> Result<Box<dyn carepoint_core::capability::EventSubscription>, carepoint_core::error::CacheError> {
            unimplemented!("not exercised in decorator tests")
        }
    }

    fn sample_facility(id: &str) -> Facility {
        Facility {
            id: FacilityId::new(id),
            name: "City Hospital".into(),
            address: Address::default(),
            location: GeoPoint::UNKNOWN,
            phone: None,
            email: None,
            website: None,
            facility_type: "hospital".into(),
            rating: 4.0,
            review_count: 10,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn decorator(store: Arc<FakeStore>) -> CachedFacilityRepository {
        CachedFacilityRepository::new(
            store,
            Arc::new(InMemoryCache { entries: Mutex::new(std::collections::HashMap::new()) }),
            Arc::new(NoopEventBus),
            "node-a",
        )
    }

    #[tokio::test]
    async fn get_by_id_reads_through_on_miss() {
        let store = Arc::new(FakeStore { facilities: Mutex::new(vec![sample_facility("F1")]), get_calls: Mutex::new(0) });
        let repo = decorator(store.clone());
        let found = repo.get_by_id(&FacilityId::new("F1")).await.unwrap();
        assert!(found.is_some());
        assert_eq!(*store.get_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn get_by_id_returns_none_for_unknown_id() {
        let store = Arc::new(FakeStore { facilities: Mutex::new(vec![]), get_calls: Mutex::new(0) });
        let repo = decorator(store);
        let found = repo.get_by_id(&FacilityId::new("missing")).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn create_invalidates_without_error() {
        let store = Arc::new(FakeStore { facilities: Mutex::new(vec![]), get_calls: Mutex::new(0) });
        let repo = decorator(store);
        let created = repo.create(sample_facility("F2")).await.unwrap();
        assert_eq!(created.id, FacilityId::new("F2"));
    }
}
