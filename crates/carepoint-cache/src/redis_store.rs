//! Redis-backed implementation of [`CacheStore`] and [`EventBus`].

use std::collections::HashMap;

use async_trait::async_trait;
use carepoint_core::capability::{CacheSubscription, CacheStore, EventBus, EventSubscription, InvalidationEvent};
use carepoint_core::error::CacheError;
use futures::StreamExt;
use redis::AsyncCommands;

/// Bound on how many keys `delete_pattern` deletes per `SCAN` round, so an
/// unexpectedly large keyspace does not load every matching key into memory
/// at once.
const SCAN_BATCH_SIZE: usize = 500;

const INVALIDATION_CHANNEL: &str = "carepoint:cache:invalidation";

/// A `CacheStore` + `EventBus` backed by a single multiplexed Redis
/// connection. Cheap to clone: the underlying `ConnectionManager` is
/// reference-counted and auto-reconnecting.
#[derive(Clone)]
pub struct RedisCacheStore {
    client: redis::Client,
    conn: redis::aio::ConnectionManager,
}

impl RedisCacheStore {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url).map_err(|err| CacheError::Unavailable { message: err.to_string() })?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|err| CacheError::Unavailable { message: err.to_string() })?;
        Ok(Self { client, conn })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(|err| CacheError::Unavailable { message: err.to_string() })
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_seconds: u64) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, value, ttl_seconds.max(1))
            .await
            .map_err(|err| CacheError::Unavailable { message: err.to_string() })?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.map_err(|err| CacheError::Unavailable { message: err.to_string() })?;
        Ok(())
    }

    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>, CacheError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = self.conn.clone();
        let values: Vec<Option<Vec<u8>>> = redis::pipe()
            .atomic()
            .get(keys)
            .query_async(&mut conn)
            .await
            .map_err(|err| CacheError::Unavailable { message: err.to_string() })?;
        Ok(keys
            .iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|v| (key.clone(), v)))
            .collect())
    }

    async fn set_multi(&self, entries: Vec<(String, Vec<u8>)>, ttl_seconds: u64) -> Result<(), CacheError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in &entries {
            pipe.set_ex(key, value, ttl_seconds.max(1));
        }
        let _: () = pipe.query_async(&mut conn).await.map_err(|err| CacheError::Unavailable { message: err.to_string() })?;
        Ok(())
    }

    async fn delete_pattern(&self, glob: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(glob)
                .arg("COUNT")
                .arg(SCAN_BATCH_SIZE)
                .query_async(&mut conn)
                .await
                .map_err(|err| CacheError::Unavailable { message: err.to_string() })?;
            if !keys.is_empty() {
                let _: () = conn.del(&keys).await.map_err(|err| CacheError::Unavailable { message: err.to_string() })?;
            }
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.publish(channel, payload).await.map_err(|err| CacheError::Unavailable { message: err.to_string() })?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn CacheSubscription>, CacheError> {
        let pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|err| CacheError::Unavailable { message: err.to_string() })?;
        let mut pubsub = pubsub;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|err| CacheError::Unavailable { message: err.to_string() })?;
        Ok(Box::new(RedisSubscription { pubsub }))
    }
}

struct RedisSubscription {
    pubsub: redis::aio::PubSub,
}

#[async_trait]
impl CacheSubscription for RedisSubscription {
    async fn next_payload(&mut self) -> Option<Vec<u8>> {
        let msg = self.pubsub.on_message().next().await?;
        msg.get_payload().ok()
    }
}

/// [`EventBus`] over the same Redis connection, on a fixed channel name.
#[async_trait]
impl EventBus for RedisCacheStore {
    async fn publish(&self, event: InvalidationEvent) -> Result<(), CacheError> {
        let payload = serde_json::to_vec(&event)?;
        CacheStore::publish(self, INVALIDATION_CHANNEL, payload).await
    }

    async fn subscribe(&self) -> Result<Box<dyn EventSubscription>, CacheError> {
        let inner = CacheStore::subscribe(self, INVALIDATION_CHANNEL).await?;
        Ok(Box::new(RedisEventSubscription { inner }))
    }
}

struct RedisEventSubscription {
    inner: Box<dyn CacheSubscription>,
}

#[async_trait]
impl EventSubscription for RedisEventSubscription {
    async fn next_event(&mut self) -> Option<InvalidationEvent> {
        let payload = self.inner.next_payload().await?;
        match serde_json::from_slice(&payload) {
            Ok(event) => Some(event),
            Err(err) => {
                tracing::warn!(error = %err, "dropping malformed invalidation event payload");
                None
            }
        }
    }
}
