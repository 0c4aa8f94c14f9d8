//! Concrete adapters for the collaborators that live outside the core's
//! capability traits but have no dedicated crate of their own: the
//! provider data feed and the enrichment provider.

pub mod data_source;
pub mod enrichment;

pub use data_source::HttpProviderDataSource;
pub use enrichment::HttpEnrichmentProvider;
