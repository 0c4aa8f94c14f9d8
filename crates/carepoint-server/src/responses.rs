//! Wire response envelopes for the HTTP surface.

use carepoint_core::capability::RankedFacility;
use carepoint_core::model::Facility;
use carepoint_core::query::{Facets, PageInfo};
use carepoint_resolver::{SearchFacilitiesResponse, SuggestedFacility};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SearchResponseBody {
    pub results: Vec<RankedFacility>,
    pub facets: Facets,
    pub page: PageInfo,
    pub total_count: u64,
}

impl From<SearchFacilitiesResponse> for SearchResponseBody {
    fn from(response: SearchFacilitiesResponse) -> Self {
        Self { results: response.results, facets: response.facets, page: response.page, total_count: response.total_count }
    }
}

#[derive(Debug, Serialize)]
pub struct SuggestResponseBody {
    pub suggestions: Vec<SuggestedFacility>,
}

impl From<Vec<SuggestedFacility>> for SuggestResponseBody {
    fn from(suggestions: Vec<SuggestedFacility>) -> Self {
        Self { suggestions }
    }
}

#[derive(Debug, Serialize)]
pub struct FacilityResponseBody {
    pub facility: Facility,
}

impl From<Facility> for FacilityResponseBody {
    fn from(facility: Facility) -> Self {
        Self { facility }
    }
}
