//! Row ↔ domain-type mapping. Kept separate from the repositories so the
//! SQL shape and the domain shape can be read side by side.

use std::collections::BTreeSet;

use carepoint_core::ids::{FacilityId, ProcedureId};
use carepoint_core::model::{Address, EnrichmentStatus, Facility, FacilityProcedure, FacilityWard, GeoPoint, Procedure, ProcedureEnrichment};
use tokio_postgres::Row;

pub fn facility_from_row(row: &Row) -> Facility {
    Facility {
        id: FacilityId::new(row.get::<_, String>("id")),
        name: row.get("name"),
        address: Address {
            street: row.get("street"),
            city: row.get("city"),
            state: row.get("state"),
            country: row.get("country"),
        },
        location: GeoPoint { lat: row.get("lat"), lon: row.get("lon") },
        phone: row.get("phone"),
        email: row.get("email"),
        website: row.get("website"),
        facility_type: row.get("facility_type"),
        rating: row.get("rating"),
        review_count: row.get::<_, i64>("review_count") as u64,
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub fn procedure_from_row(row: &Row) -> Procedure {
    let tags: Vec<String> = row.get("normalized_tags");
    Procedure {
        id: ProcedureId::new(row.get::<_, String>("id")),
        code: row.get("code"),
        name: row.get("name"),
        display_name: row.get("display_name"),
        category: row.get("category"),
        description: row.get("description"),
        normalized_tags: tags.into_iter().collect::<BTreeSet<_>>(),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub fn facility_procedure_from_row(row: &Row) -> FacilityProcedure {
    FacilityProcedure {
        id: row.get("id"),
        facility_id: FacilityId::new(row.get::<_, String>("facility_id")),
        procedure_id: ProcedureId::new(row.get::<_, String>("procedure_id")),
        price: row.get("price"),
        currency: row.get("currency"),
        estimated_duration_minutes: row.get::<_, Option<i32>>("estimated_duration_minutes").map(|v| v as u32),
        is_available: row.get("is_available"),
    }
}

pub fn ward_from_row(row: &Row) -> FacilityWard {
    FacilityWard {
        facility_id: FacilityId::new(row.get::<_, String>("facility_id")),
        ward_name: row.get("ward_name"),
        capacity_status: row.get("capacity_status"),
        avg_wait_minutes: row.get::<_, Option<i32>>("avg_wait_minutes").map(|v| v as u32),
        urgent_care_available: row.get("urgent_care_available"),
        last_updated: row.get("last_updated"),
    }
}

pub fn enrichment_from_row(row: &Row) -> ProcedureEnrichment {
    let status: String = row.get("status");
    ProcedureEnrichment {
        procedure_id: ProcedureId::new(row.get::<_, String>("procedure_id")),
        description: row.get("description"),
        prep_steps: row.get("prep_steps"),
        risks: row.get("risks"),
        recovery: row.get("recovery"),
        search_concepts: row.get("search_concepts"),
        provider_identifier: row.get("provider_identifier"),
        model_identifier: row.get("model_identifier"),
        status: match status.as_str() {
            "succeeded" => EnrichmentStatus::Succeeded,
            "failed" => EnrichmentStatus::Failed,
            _ => EnrichmentStatus::Pending,
        },
        enrichment_version: row.get("enrichment_version"),
        retry_count: row.get::<_, i32>("retry_count") as u32,
        last_error: row.get("last_error"),
    }
}

pub fn enrichment_status_str(status: EnrichmentStatus) -> &'static str {
    match status {
        EnrichmentStatus::Pending => "pending",
        EnrichmentStatus::Succeeded => "succeeded",
        EnrichmentStatus::Failed => "failed",
    }
}
