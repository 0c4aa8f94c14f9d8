//! Shared query/response shapes used by the search adapter, the
//! transactional-store fallback, and the query resolver.
//!
//! Keeping these in `carepoint-core` (rather than duplicating a near-copy in
//! `carepoint-search` and `carepoint-store`) is what lets the resolver hand
//! the same [`SearchParams`] to either backend and treat the result
//! uniformly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::GeoPoint;

/// Parameters for a faceted facility search, shared by
/// [`crate::capability::SearchAdapter::search`] and
/// [`crate::capability::FacilityRepository::search_with_count`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchParams {
    /// Free-text query, already normalized/spell-fixed by query
    /// understanding. Empty or absent means match-all.
    pub query: String,
    /// `None` (or `GeoPoint::UNKNOWN`) disables geo-radius filtering.
    pub location: Option<GeoPoint>,
    /// Radius in kilometers; only meaningful when `location` is set.
    pub radius_km: f64,
    pub insurance: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub limit: u32,
    pub offset: u32,
}

impl SearchParams {
    /// `offset/limit + 1`, the engine-facing page convention.
    /// Guards against division by zero; callers validate `limit > 0` first.
    pub fn page_number(&self) -> u32 {
        if self.limit == 0 {
            1
        } else {
            self.offset / self.limit + 1
        }
    }
}

/// Cache-key-stable hash of a [`SearchParams`] tuple, used for
/// `facilities:search:count:{hash}` keys.
pub fn stable_params_hash(params: &SearchParams) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(params.query.as_bytes());
    if let Some(loc) = &params.location {
        hasher.update(format!("{:.6},{:.6}", loc.lat, loc.lon).as_bytes());
    }
    hasher.update(format!("{:.3}", params.radius_km).as_bytes());
    hasher.update(params.insurance.as_deref().unwrap_or("").as_bytes());
    hasher.update(format!("{:?}{:?}", params.min_price, params.max_price).as_bytes());
    hasher.update(format!("{}:{}", params.limit, params.offset).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Filter for `list(filter)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacilityListFilter {
    pub facility_type: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

/// A single facet bucket: `(value, count)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetBucket {
    pub value: String,
    pub count: u64,
}

/// Facets bucketed over the full filtered-but-unpaginated candidate set
/// (never the post-rank page).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Facets(pub BTreeMap<String, Vec<FacetBucket>>);

/// Pagination metadata derived from `total_found`, `limit`, and `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub has_next: bool,
    pub has_prev: bool,
    pub current_page: u32,
    pub total_pages: u32,
}

impl PageInfo {
    /// `limit <= 0` must be rejected at the edge before this is called —
    /// see [`crate::error::ValidationError::LimitOutOfRange`].
    pub fn compute(total_found: u64, limit: u32, offset: u32) -> Self {
        debug_assert!(limit > 0, "limit must be validated before computing PageInfo");
        let limit = limit.max(1) as u64;
        let total_pages = total_found.div_ceil(limit).max(1) as u32;
        let current_page = (offset as u64 / limit + 1) as u32;
        Self {
            has_next: (offset as u64 + limit) < total_found,
            has_prev: offset > 0,
            current_page,
            total_pages,
        }
    }
}

/// Detected intent of a user query, used by the ranker to weight signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryIntent {
    /// No particular signal detected; rank on relevance alone.
    General,
    /// Query emphasizes cost ("cheapest", "affordable").
    PriceSensitive,
    /// Query emphasizes proximity ("near me", "nearby").
    LocationSensitive,
    /// Query emphasizes urgency ("emergency", "urgent").
    Urgent,
}

impl Default for QueryIntent {
    fn default() -> Self {
        QueryIntent::General
    }
}

/// Output of [`crate::capability::QueryUnderstanding::understand`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnderstoodQuery {
    pub normalized: String,
    pub terms: Vec<String>,
    pub synonyms: Vec<String>,
    pub spell_fixed: String,
    pub intent: QueryIntent,
    pub confidence: f64,
}

impl UnderstoodQuery {
    /// The disabled/fallthrough form used when query understanding has no
    /// configuration loaded: `normalized == raw_query`, terms are a plain
    /// whitespace tokenization, everything else defaults to "unknown".
    pub fn raw_fallback(raw_query: &str) -> Self {
        Self {
            normalized: raw_query.to_string(),
            terms: tokenize(raw_query),
            synonyms: Vec::new(),
            spell_fixed: raw_query.to_string(),
            intent: QueryIntent::General,
            confidence: 0.0,
        }
    }
}

/// Plain whitespace tokenizer used as the fallback when query understanding
/// is disabled.
pub fn tokenize(raw_query: &str) -> Vec<String> {
    raw_query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_info_matches_spec_scenario() {
        // 37 facilities, limit=10, offset=20 -> page 3 of 4, has_next/has_prev true.
        let info = PageInfo::compute(37, 10, 20);
        assert_eq!(info.current_page, 3);
        assert_eq!(info.total_pages, 4);
        assert!(info.has_next);
        assert!(info.has_prev);
    }

    #[test]
    fn page_info_first_page() {
        let info = PageInfo::compute(37, 10, 0);
        assert_eq!(info.current_page, 1);
        assert!(!info.has_prev);
        assert!(info.has_next);
    }

    #[test]
    fn page_info_last_page() {
        let info = PageInfo::compute(37, 10, 30);
        assert_eq!(info.current_page, 4);
        assert!(!info.has_next);
    }

    #[test]
    fn stable_hash_is_deterministic() {
        let p = SearchParams {
            query: "caesarean".into(),
            limit: 20,
            ..Default::default()
        };
        assert_eq!(stable_params_hash(&p), stable_params_hash(&p));
    }

    #[test]
    fn page_number_guards_zero_limit() {
        let p = SearchParams { limit: 0, offset: 5, ..Default::default() };
        assert_eq!(p.page_number(), 1);
    }

    #[test]
    fn tokenize_lowercases_and_splits() {
        assert_eq!(tokenize("  Caesarean   Section "), vec!["caesarean", "section"]);
    }
}
