//! Postgres-backed [`FacilityRepository`].

use async_trait::async_trait;
use carepoint_core::capability::FacilityRepository;
use carepoint_core::error::StoreError;
use carepoint_core::ids::FacilityId;
use carepoint_core::model::Facility;
use carepoint_core::query::{FacilityListFilter, SearchParams};
use deadpool_postgres::Pool;

use crate::rows::facility_from_row;

const FACILITY_COLUMNS: &str = "id, name, street, city, state, country, lat, lon, phone, email, website, facility_type, rating, review_count, is_active, created_at, updated_at";

pub struct PostgresFacilityRepository {
    pool: Pool,
}

impl PostgresFacilityRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<deadpool_postgres::Object, StoreError> {
        self.pool.get().await.map_err(|err| StoreError::Unavailable { message: err.to_string() })
    }
}

#[async_trait]
impl FacilityRepository for PostgresFacilityRepository {
    async fn get_by_id(&self, id: &FacilityId) -> Result<Option<Facility>, StoreError> {
        let conn = self.conn().await?;
        let query = format!("SELECT {FACILITY_COLUMNS} FROM facilities WHERE id = $1");
        let row = conn
            .query_opt(&query, &[&id.as_str()])
            .await
            .map_err(|err| StoreError::Transient { message: err.to_string() })?;
        Ok(row.as_ref().map(facility_from_row))
    }

    async fn get_by_ids(&self, ids: &[FacilityId]) -> Result<Vec<Facility>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn().await?;
        let id_strs: Vec<&str> = ids.iter().map(FacilityId::as_str).collect();
        let query = format!("SELECT {FACILITY_COLUMNS} FROM facilities WHERE id = ANY($1)");
        let rows = conn
            .query(&query, &[&id_strs])
            .await
            .map_err(|err| StoreError::Transient { message: err.to_string() })?;
        Ok(rows.iter().map(facility_from_row).collect())
    }

    async fn list(&self, filter: &FacilityListFilter) -> Result<Vec<Facility>, StoreError> {
        let conn = self.conn().await?;
        let limit = filter.limit.max(1) as i64;
        let offset = filter.offset as i64;
        let rows = match &filter.facility_type {
            Some(facility_type) => {
                let query = format!(
                    "SELECT {FACILITY_COLUMNS} FROM facilities WHERE is_active = true AND facility_type = $1 ORDER BY id LIMIT $2 OFFSET $3"
                );
                conn.query(&query, &[facility_type, &limit, &offset]).await
            }
            None => {
                let query = format!("SELECT {FACILITY_COLUMNS} FROM facilities WHERE is_active = true ORDER BY id LIMIT $1 OFFSET $2");
                conn.query(&query, &[&limit, &offset]).await
            }
        }
        .map_err(|err| StoreError::Transient { message: err.to_string() })?;
        Ok(rows.iter().map(facility_from_row).collect())
    }

    /// The database-fallback search path. A
    /// correctness safety net, not a performance path: full substring match
    /// on name/type plus bounding-box-free haversine filtering in Rust,
    /// since a plain SQL query has no typo tolerance or ranking signal of
    /// its own — those are the search index's job.
    async fn search_with_count(&self, params: &SearchParams) -> Result<(Vec<Facility>, u64), StoreError> {
        let conn = self.conn().await?;
        let like_pattern = format!("%{}%", params.query.trim());

        let rows = match (params.min_price, params.max_price) {
            (None, None) => conn
                .query(
                    "SELECT id, name, street, city, state, country, lat, lon, phone, email, website, facility_type, rating, review_count, is_active, created_at, updated_at
                     FROM facilities
                     WHERE is_active = true AND (name ILIKE $1 OR facility_type ILIKE $1)
                     ORDER BY id",
                    &[&like_pattern],
                )
                .await,
            (min_price, max_price) => {
                let min_price = min_price.unwrap_or(f64::MIN);
                let max_price = max_price.unwrap_or(f64::MAX);
                conn.query(
                    "SELECT id, name, street, city, state, country, lat, lon, phone, email, website, facility_type, rating, review_count, is_active, created_at, updated_at
                     FROM facilities
                     WHERE is_active = true AND (name ILIKE $1 OR facility_type ILIKE $1)
                       AND EXISTS (
                         SELECT 1 FROM facility_procedures fp
                         WHERE fp.facility_id = facilities.id AND fp.price >= $2 AND fp.price <= $3
                       )
                     ORDER BY id",
                    &[&like_pattern, &min_price, &max_price],
                )
                .await
            }
        }
        .map_err(|err| StoreError::Transient { message: err.to_string() })?;

        let mut candidates: Vec<Facility> = rows.iter().map(facility_from_row).collect();

        if let Some(location) = params.location.filter(|loc| !loc.is_unknown()) {
            let radius = if params.radius_km > 0.0 { params.radius_km } else { 50.0 };
            candidates.retain(|facility| !facility.location.is_unknown() && facility.location.distance_km(&location) <= radius);
        }

        let total = candidates.len() as u64;
        let offset = params.offset as usize;
        let limit = params.limit.max(1) as usize;
        let page = candidates.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    async fn create(&self, facility: Facility) -> Result<Facility, StoreError> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO facilities (id, name, street, city, state, country, lat, lon, phone, email, website, facility_type, rating, review_count, is_active, created_at, updated_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17)
             ON CONFLICT (id) DO UPDATE SET
               name = EXCLUDED.name, street = EXCLUDED.street, city = EXCLUDED.city, state = EXCLUDED.state,
               country = EXCLUDED.country, lat = EXCLUDED.lat, lon = EXCLUDED.lon, phone = EXCLUDED.phone,
               email = EXCLUDED.email, website = EXCLUDED.website, facility_type = EXCLUDED.facility_type,
               rating = EXCLUDED.rating, review_count = EXCLUDED.review_count, is_active = EXCLUDED.is_active,
               updated_at = EXCLUDED.updated_at",
            &[
                &facility.id.as_str(), &facility.name, &facility.address.street, &facility.address.city,
                &facility.address.state, &facility.address.country, &facility.location.lat, &facility.location.lon,
                &facility.phone, &facility.email, &facility.website, &facility.facility_type, &facility.rating,
                &(facility.review_count as i64), &facility.is_active, &facility.created_at, &facility.updated_at,
            ],
        )
        .await
        .map_err(|err| StoreError::Transient { message: err.to_string() })?;
        Ok(facility)
    }

    async fn update(&self, facility: Facility) -> Result<Facility, StoreError> {
        self.create(facility).await
    }

    async fn delete(&self, id: &FacilityId) -> Result<(), StoreError> {
        let conn = self.conn().await?;
        conn.execute("UPDATE facilities SET is_active = false, updated_at = now() WHERE id = $1", &[&id.as_str()])
            .await
            .map_err(|err| StoreError::Transient { message: err.to_string() })?;
        Ok(())
    }

    /// Ordered `review_count desc, rating desc, id asc` — the explicit
    /// "top N" criterion chosen for the cache warmer's open question.
    async fn top_facilities(&self, n: u32) -> Result<Vec<Facility>, StoreError> {
        let conn = self.conn().await?;
        let query = format!("SELECT {FACILITY_COLUMNS} FROM facilities WHERE is_active = true ORDER BY review_count DESC, rating DESC, id ASC LIMIT $1");
        let rows = conn
            .query(&query, &[&(n as i64)])
            .await
            .map_err(|err| StoreError::Transient { message: err.to_string() })?;
        Ok(rows.iter().map(facility_from_row).collect())
    }
}
