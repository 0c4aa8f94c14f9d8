//! Entities held by the transactional store, plus the projections
//! ([`SearchDocument`]) and cache payloads derived from them.
//!
//! The transactional store owns every type in this module; the search index
//! and cache hold projections owned by their writer (see the crate-level
//! docs on ownership in `carepoint-ingest` and `carepoint-cache`).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{FacilityId, ProcedureId};

/// A healthcare provider location offering one or more procedures.
///
/// A logically deleted facility has `is_active == false`; readers MUST
/// filter it out by default (see [`crate::capability::FacilityRepository`]
/// and the search/cache layers built on top of it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: FacilityId,
    pub name: String,
    pub address: Address,
    /// (0, 0) is the "unknown location" sentinel throughout the core.
    pub location: GeoPoint,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub facility_type: String,
    /// Rating in `[0, 5]`.
    pub rating: f64,
    pub review_count: u64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A postal address. Any field may be empty when the provider didn't supply it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub country: String,
}

impl Address {
    /// Whether this address has enough structured content to build a
    /// geocoder query from (street, city, or state is non-empty).
    pub fn is_usable(&self) -> bool {
        !self.street.trim().is_empty() || !self.city.trim().is_empty() || !self.state.trim().is_empty()
    }
}

/// A latitude/longitude pair. `(0.0, 0.0)` is the "unknown" sentinel used
/// throughout the search and geocoding layers to mean "do not filter by
/// location" / "no coordinates available".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const UNKNOWN: GeoPoint = GeoPoint { lat: 0.0, lon: 0.0 };

    pub fn is_unknown(&self) -> bool {
        self.lat == 0.0 && self.lon == 0.0
    }

    pub fn known(lat: f64, lon: f64) -> Option<Self> {
        if lat == 0.0 && lon == 0.0 {
            None
        } else {
            Some(Self { lat, lon })
        }
    }

    /// Great-circle distance in kilometers (haversine formula).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0088;
        let (lat1, lon1) = (self.lat.to_radians(), self.lon.to_radians());
        let (lat2, lon2) = (other.lat.to_radians(), other.lon.to_radians());
        let dlat = lat2 - lat1;
        let dlon = lon2 - lon1;
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();
        EARTH_RADIUS_KM * c
    }
}

impl Default for GeoPoint {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// A named medical service, normalized from whatever the provider called it.
///
/// `name` preserves the provider's original string verbatim; `display_name`
/// and `normalized_tags` are the normalizer's output (see
/// `carepoint-normalize`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub id: ProcedureId,
    /// Provider-specific procedure code, when one was supplied.
    pub code: Option<String>,
    /// The original provider string, verbatim.
    pub name: String,
    pub display_name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub normalized_tags: BTreeSet<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The price/availability of a procedure at a facility — the unit users
/// actually shop for. Unique on `(facility_id, procedure_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityProcedure {
    pub id: String,
    pub facility_id: FacilityId,
    pub procedure_id: ProcedureId,
    /// Non-negative; currency minor units are not assumed (see `currency`).
    pub price: f64,
    pub currency: String,
    pub estimated_duration_minutes: Option<u32>,
    /// Rows with `is_available == false` are still returned to readers,
    /// marked unavailable — they are never silently dropped.
    pub is_available: bool,
}

/// Status of a procedure's enrichment (prose + search concepts from an
/// external model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrichmentStatus {
    Pending,
    Succeeded,
    Failed,
}

/// One-to-one with [`Procedure`] by `procedure_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureEnrichment {
    pub procedure_id: ProcedureId,
    pub description: Option<String>,
    pub prep_steps: Vec<String>,
    pub risks: Vec<String>,
    pub recovery: Option<String>,
    pub search_concepts: Vec<String>,
    pub provider_identifier: Option<String>,
    pub model_identifier: Option<String>,
    pub status: EnrichmentStatus,
    /// Rows with `enrichment_version < target` are candidates for
    /// (re)enrichment (see [`crate::capability::EnrichmentProvider`]).
    pub enrichment_version: i32,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

/// `(facility_id, ward_name)` capacity/wait-time snapshot. Upserted on
/// conflict; there is no history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityWard {
    pub facility_id: FacilityId,
    pub ward_name: String,
    pub capacity_status: String,
    pub avg_wait_minutes: Option<u32>,
    pub urgent_care_available: bool,
    pub last_updated: DateTime<Utc>,
}

/// A marker row recording that an ingestion record has already been
/// processed. Presence (within TTL) means "skip".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionIdempotencyRecord {
    pub key: crate::ids::IdempotencyKey,
    pub processed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// The fixed-shape projection of a [`Facility`] held by the search index.
///
/// This is a derived, lossy view: every field here is reconstructible from
/// the transactional store, so the document can be deleted or rebuilt at
/// any time without losing information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: FacilityId,
    pub name: String,
    pub facility_type: String,
    pub is_active: bool,
    pub location: GeoPoint,
    /// Carried through from `Facility.address.city` for facet bucketing;
    /// may be empty when the facility has no resolved address.
    pub city: String,
    /// Carried through from `Facility.address.state` for facet bucketing.
    pub state: String,
    pub rating: f64,
    pub review_count: u64,
    pub created_at: DateTime<Utc>,
    pub insurance: BTreeSet<String>,
    pub tags: BTreeSet<String>,
    pub procedures: BTreeSet<String>,
}

/// Maximum number of tags a [`SearchDocument`] may carry (see
/// `carepoint-search`'s upsert projection).
pub const MAX_SEARCH_TAGS: usize = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geo_point_unknown_is_zero_zero() {
        assert!(GeoPoint::UNKNOWN.is_unknown());
        assert!(GeoPoint::default().is_unknown());
        assert_eq!(GeoPoint::known(0.0, 0.0), None);
        assert!(GeoPoint::known(1.0, 0.0).is_some());
    }

    #[test]
    fn distance_km_is_zero_for_identical_points() {
        let p = GeoPoint { lat: 40.0, lon: -70.0 };
        assert!(p.distance_km(&p) < 1e-6);
    }

    #[test]
    fn distance_km_known_pair() {
        // Lagos to Port Harcourt is roughly 460km.
        let lagos = GeoPoint { lat: 6.5244, lon: 3.3792 };
        let ph = GeoPoint { lat: 4.8156, lon: 7.0498 };
        let d = lagos.distance_km(&ph);
        assert!((400.0..550.0).contains(&d), "distance was {d}");
    }

    #[test]
    fn address_usability() {
        assert!(!Address::default().is_usable());
        assert!(Address { city: "Lagos".into(), ..Default::default() }.is_usable());
    }
}
