//! Postgres-backed [`IdempotencyStore`].

use async_trait::async_trait;
use carepoint_core::capability::IdempotencyStore;
use carepoint_core::error::StoreError;
use carepoint_core::ids::IdempotencyKey;
use chrono::{Duration, Utc};
use deadpool_postgres::Pool;

pub struct PostgresIdempotencyStore {
    pool: Pool,
}

impl PostgresIdempotencyStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdempotencyStore for PostgresIdempotencyStore {
    async fn contains(&self, key: &IdempotencyKey) -> Result<bool, StoreError> {
        let conn = self.pool.get().await.map_err(|err| StoreError::Unavailable { message: err.to_string() })?;
        let row = conn
            .query_opt("SELECT 1 FROM ingestion_idempotency_records WHERE key = $1 AND expires_at > now()", &[&key.as_str()])
            .await
            .map_err(|err| StoreError::Transient { message: err.to_string() })?;
        Ok(row.is_some())
    }

    async fn record(&self, key: IdempotencyKey, ttl_minutes: u32) -> Result<(), StoreError> {
        let conn = self.pool.get().await.map_err(|err| StoreError::Unavailable { message: err.to_string() })?;
        let now = Utc::now();
        let expires_at = now + Duration::minutes(ttl_minutes as i64);
        conn.execute(
            "INSERT INTO ingestion_idempotency_records (key, processed_at, expires_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (key) DO UPDATE SET processed_at = EXCLUDED.processed_at, expires_at = EXCLUDED.expires_at",
            &[&key.as_str(), &now, &expires_at],
        )
        .await
        .map_err(|err| StoreError::Transient { message: err.to_string() })?;
        Ok(())
    }
}
