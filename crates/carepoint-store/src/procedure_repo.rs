//! Postgres-backed [`ProcedureRepository`], [`FacilityProcedureRepository`],
//! [`WardRepository`], and [`EnrichmentRepository`].

use async_trait::async_trait;
use carepoint_core::capability::{EnrichmentRepository, FacilityProcedureRepository, ProcedureRepository, WardRepository};
use carepoint_core::error::StoreError;
use carepoint_core::ids::ProcedureId;
use carepoint_core::model::{FacilityProcedure, FacilityWard, Procedure, ProcedureEnrichment};
use deadpool_postgres::Pool;

use crate::rows::{enrichment_from_row, enrichment_status_str, procedure_from_row};

pub struct PostgresProcedureRepository {
    pool: Pool,
}

impl PostgresProcedureRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<deadpool_postgres::Object, StoreError> {
        self.pool.get().await.map_err(|err| StoreError::Unavailable { message: err.to_string() })
    }
}

#[async_trait]
impl ProcedureRepository for PostgresProcedureRepository {
    /// Upserts by `code` when present, falling back to `name` — this order
    /// lets a later record that carries a code for a previously code-less
    /// procedure converge onto the same row.
    async fn upsert_by_code_or_name(&self, procedure: Procedure) -> Result<Procedure, StoreError> {
        let conn = self.conn().await?;
        let tags: Vec<String> = procedure.normalized_tags.iter().cloned().collect();

        let existing_id = if let Some(code) = &procedure.code {
            conn.query_opt("SELECT id FROM procedures WHERE code = $1", &[code])
                .await
                .map_err(|err| StoreError::Transient { message: err.to_string() })?
                .map(|row| row.get::<_, String>("id"))
        } else {
            conn.query_opt("SELECT id FROM procedures WHERE name = $1", &[&procedure.name])
                .await
                .map_err(|err| StoreError::Transient { message: err.to_string() })?
                .map(|row| row.get::<_, String>("id"))
        };

        let id = existing_id.unwrap_or_else(|| procedure.id.to_string());

        conn.execute(
            "INSERT INTO procedures (id, code, name, display_name, category, description, normalized_tags, is_active, created_at, updated_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
             ON CONFLICT (id) DO UPDATE SET
               code = EXCLUDED.code, display_name = EXCLUDED.display_name, category = EXCLUDED.category,
               description = EXCLUDED.description, normalized_tags = EXCLUDED.normalized_tags,
               is_active = EXCLUDED.is_active, updated_at = EXCLUDED.updated_at",
            &[
                &id, &procedure.code, &procedure.name, &procedure.display_name, &procedure.category,
                &procedure.description, &tags, &procedure.is_active, &procedure.created_at, &procedure.updated_at,
            ],
        )
        .await
        .map_err(|err| StoreError::Transient { message: err.to_string() })?;

        Ok(Procedure { id: ProcedureId::new(id), ..procedure })
    }

    async fn get_by_id(&self, id: &ProcedureId) -> Result<Option<Procedure>, StoreError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt("SELECT * FROM procedures WHERE id = $1", &[&id.as_str()])
            .await
            .map_err(|err| StoreError::Transient { message: err.to_string() })?;
        Ok(row.as_ref().map(procedure_from_row))
    }

    async fn enrichment_candidates(&self, target_version: i32, retry_cap: u32) -> Result<Vec<Procedure>, StoreError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                "SELECT p.* FROM procedures p
                 LEFT JOIN procedure_enrichments e ON e.procedure_id = p.id
                 WHERE p.is_active = true
                   AND (e.procedure_id IS NULL
                        OR e.enrichment_version < $1
                        OR (e.status = 'failed' AND e.retry_count < $2))",
                &[&target_version, &(retry_cap as i32)],
            )
            .await
            .map_err(|err| StoreError::Transient { message: err.to_string() })?;
        Ok(rows.iter().map(procedure_from_row).collect())
    }
}

pub struct PostgresFacilityProcedureRepository {
    pool: Pool,
}

impl PostgresFacilityProcedureRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FacilityProcedureRepository for PostgresFacilityProcedureRepository {
    async fn upsert(&self, row: FacilityProcedure) -> Result<FacilityProcedure, StoreError> {
        let conn = self.pool.get().await.map_err(|err| StoreError::Unavailable { message: err.to_string() })?;
        conn.execute(
            "INSERT INTO facility_procedures (id, facility_id, procedure_id, price, currency, estimated_duration_minutes, is_available)
             VALUES ($1,$2,$3,$4,$5,$6,$7)
             ON CONFLICT (facility_id, procedure_id) DO UPDATE SET
               price = EXCLUDED.price, currency = EXCLUDED.currency,
               estimated_duration_minutes = EXCLUDED.estimated_duration_minutes, is_available = EXCLUDED.is_available",
            &[
                &row.id, &row.facility_id.as_str(), &row.procedure_id.as_str(), &row.price, &row.currency,
                &row.estimated_duration_minutes.map(|v| v as i32), &row.is_available,
            ],
        )
        .await
        .map_err(|err| StoreError::Transient { message: err.to_string() })?;
        Ok(row)
    }
}

pub struct PostgresWardRepository {
    pool: Pool,
}

impl PostgresWardRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WardRepository for PostgresWardRepository {
    async fn upsert(&self, ward: FacilityWard) -> Result<FacilityWard, StoreError> {
        let conn = self.pool.get().await.map_err(|err| StoreError::Unavailable { message: err.to_string() })?;
        conn.execute(
            "INSERT INTO facility_wards (facility_id, ward_name, capacity_status, avg_wait_minutes, urgent_care_available, last_updated)
             VALUES ($1,$2,$3,$4,$5,$6)
             ON CONFLICT (facility_id, ward_name) DO UPDATE SET
               capacity_status = EXCLUDED.capacity_status, avg_wait_minutes = EXCLUDED.avg_wait_minutes,
               urgent_care_available = EXCLUDED.urgent_care_available, last_updated = EXCLUDED.last_updated",
            &[
                &ward.facility_id.as_str(), &ward.ward_name, &ward.capacity_status,
                &ward.avg_wait_minutes.map(|v| v as i32), &ward.urgent_care_available, &ward.last_updated,
            ],
        )
        .await
        .map_err(|err| StoreError::Transient { message: err.to_string() })?;
        Ok(ward)
    }
}

pub struct PostgresEnrichmentRepository {
    pool: Pool,
}

impl PostgresEnrichmentRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EnrichmentRepository for PostgresEnrichmentRepository {
    async fn upsert(&self, enrichment: ProcedureEnrichment) -> Result<ProcedureEnrichment, StoreError> {
        let conn = self.pool.get().await.map_err(|err| StoreError::Unavailable { message: err.to_string() })?;
        let status = enrichment_status_str(enrichment.status);
        conn.execute(
            "INSERT INTO procedure_enrichments
               (procedure_id, description, prep_steps, risks, recovery, search_concepts, provider_identifier, model_identifier, status, enrichment_version, retry_count, last_error)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
             ON CONFLICT (procedure_id) DO UPDATE SET
               description = EXCLUDED.description, prep_steps = EXCLUDED.prep_steps, risks = EXCLUDED.risks,
               recovery = EXCLUDED.recovery, search_concepts = EXCLUDED.search_concepts,
               provider_identifier = EXCLUDED.provider_identifier, model_identifier = EXCLUDED.model_identifier,
               status = EXCLUDED.status, enrichment_version = EXCLUDED.enrichment_version,
               retry_count = EXCLUDED.retry_count, last_error = EXCLUDED.last_error",
            &[
                &enrichment.procedure_id.as_str(), &enrichment.description, &enrichment.prep_steps, &enrichment.risks,
                &enrichment.recovery, &enrichment.search_concepts, &enrichment.provider_identifier,
                &enrichment.model_identifier, &status, &enrichment.enrichment_version,
                &(enrichment.retry_count as i32), &enrichment.last_error,
            ],
        )
        .await
        .map_err(|err| StoreError::Transient { message: err.to_string() })?;
        Ok(enrichment)
    }

    async fn get(&self, procedure_id: &ProcedureId) -> Result<Option<ProcedureEnrichment>, StoreError> {
        let conn = self.pool.get().await.map_err(|err| StoreError::Unavailable { message: err.to_string() })?;
        let row = conn
            .query_opt("SELECT * FROM procedure_enrichments WHERE procedure_id = $1", &[&procedure_id.as_str()])
            .await
            .map_err(|err| StoreError::Transient { message: err.to_string() })?;
        Ok(row.as_ref().map(enrichment_from_row))
    }
}
