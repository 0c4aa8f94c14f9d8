//! The Meilisearch-facing document shape and its projection from a
//! [`Facility`] plus derived tag/insurance sets.

use std::collections::BTreeSet;

use carepoint_core::model::{Facility, GeoPoint, SearchDocument, MAX_SEARCH_TAGS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The on-the-wire document shape. Meilisearch's `_geo` convention wants a
/// `{lat, lng}` object; everything else mirrors [`SearchDocument`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityDocument {
    pub id: String,
    pub name: String,
    pub facility_type: String,
    pub is_active: bool,
    #[serde(rename = "_geo", skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoField>,
    pub city: String,
    pub state: String,
    pub rating: f64,
    pub review_count: u64,
    pub created_at: DateTime<Utc>,
    pub insurance: Vec<String>,
    pub tags: Vec<String>,
    pub procedures: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoField {
    pub lat: f64,
    pub lng: f64,
}

impl FacilityDocument {
    /// Builds the document from a facility plus a pre-assembled tag set and
    /// insurance list. Tags are de-duplicated by lower-cased trim and
    /// capped at [`MAX_SEARCH_TAGS`]; extras beyond the cap are dropped,
    /// keeping insertion order stable (facility attributes first).
    pub fn project(facility: &Facility, extra_tags: Vec<String>, insurance: Vec<String>) -> Self {
        let mut seen = BTreeSet::new();
        let mut tags = Vec::new();

        let mut push_tag = |raw: &str, seen: &mut BTreeSet<String>, tags: &mut Vec<String>| {
            let normalized = raw.trim().to_lowercase();
            if normalized.is_empty() || tags.len() >= MAX_SEARCH_TAGS || !seen.insert(normalized.clone()) {
                return;
            }
            tags.push(normalized);
        };

        push_tag(&facility.name, &mut seen, &mut tags);
        push_tag(&facility.facility_type, &mut seen, &mut tags);
        push_tag(&facility.address.city, &mut seen, &mut tags);
        push_tag(&facility.address.state, &mut seen, &mut tags);
        push_tag(&facility.address.country, &mut seen, &mut tags);
        for name in &insurance {
            push_tag(name, &mut seen, &mut tags);
        }
        for tag in &extra_tags {
            push_tag(tag, &mut seen, &mut tags);
        }

        Self {
            id: facility.id.to_string(),
            name: facility.name.clone(),
            facility_type: facility.facility_type.clone(),
            is_active: facility.is_active,
            geo: (!facility.location.is_unknown()).then_some(GeoField { lat: facility.location.lat, lng: facility.location.lon }),
            city: facility.address.city.clone(),
            state: facility.address.state.clone(),
            rating: facility.rating,
            review_count: facility.review_count,
            created_at: facility.created_at,
            insurance,
            tags,
            procedures: extra_tags,
        }
    }

    pub fn into_search_document(self) -> SearchDocument {
        SearchDocument {
            id: carepoint_core::ids::FacilityId::new(self.id),
            name: self.name,
            facility_type: self.facility_type,
            is_active: self.is_active,
            location: self.geo.map(|g| GeoPoint { lat: g.lat, lon: g.lng }).unwrap_or(GeoPoint::UNKNOWN),
            city: self.city,
            state: self.state,
            rating: self.rating,
            review_count: self.review_count,
            created_at: self.created_at,
            insurance: self.insurance.into_iter().collect(),
            tags: self.tags.into_iter().collect(),
            procedures: self.procedures.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carepoint_core::model::Address;
    use carepoint_core::ids::FacilityId;

    fn sample() -> Facility {
        Facility {
            id: FacilityId::new("fac_1"),
            name: "City Hospital".into(),
            address: Address { city: "Lagos".into(), state: "Lagos".into(), country: "Nigeria".into(), street: String::new() },
            location: GeoPoint { lat: 6.5, lon: 3.3 },
            phone: None,
            email: None,
            website: None,
            facility_type: "hospital".into(),
            rating: 4.5,
            review_count: 120,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn tags_are_deduplicated_and_lowercased() {
        let doc = FacilityDocument::project(&sample(), vec!["Lagos".into(), "caesarean_section".into()], vec!["NHIS".into()]);
        let lagos_count = doc.tags.iter().filter(|t| *t == "lagos").count();
        assert_eq!(lagos_count, 1);
        assert!(doc.tags.contains(&"nhis".to_string()));
    }

    #[test]
    fn tags_are_capped() {
        let extra: Vec<String> = (0..200).map(|i| format!("tag{i}")).collect();
        let doc = FacilityDocument::project(&sample(), extra, vec![]);
        assert!(doc.tags.len() <= MAX_SEARCH_TAGS);
    }

    #[test]
    fn unknown_location_omits_geo_field() {
        let mut f = sample();
        f.location = GeoPoint::UNKNOWN;
        let doc = FacilityDocument::project(&f, vec![], vec![]);
        assert!(doc.geo.is_none());
    }
}
