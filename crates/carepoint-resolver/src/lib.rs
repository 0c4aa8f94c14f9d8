//! Query resolution: turns a raw search request into a ranked,
//! faceted, paginated response, backed by the search index with a database
//! fallback and cache-aside hydration.

pub mod analytics;
pub mod facets;
pub mod ranker;
pub mod resolver;

pub use analytics::{AnalyticsSink, LoggingAnalyticsSink, SearchAnalyticsEvent};
pub use facets::build_facets;
pub use ranker::DefaultRanker;
pub use resolver::{QueryResolver, SearchFacilitiesRequest, SearchFacilitiesResponse, SuggestedFacility};
