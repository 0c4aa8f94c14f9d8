//! Ingestion coordinator: pulls provider records page-by-page and
//! makes the store, search index, and cache converge to a consistent view,
//! exactly-once per record within an idempotency window.

pub mod backoff;
pub mod config;
pub mod coordinator;
pub mod enrichment_worker;
pub mod region;
pub mod scheduler;

pub use config::IngestConfig;
pub use coordinator::{IngestionCoordinator, IngestionSummary};
pub use enrichment_worker::{spawn_enrichment_worker, EnrichmentWorkerHandle};
pub use scheduler::{spawn_ingestion_scheduler, IngestionSchedulerHandle};
