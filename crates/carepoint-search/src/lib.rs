//! Meilisearch-backed search adapter: schema setup, document
//! projection, faceted/geo search, and typo-tolerant suggestions.

pub mod adapter;
pub mod document;

pub use adapter::MeiliSearchAdapter;
pub use document::FacilityDocument;
