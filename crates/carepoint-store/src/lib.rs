//! PostgreSQL-backed transactional store.
//!
//! Every repository here talks to the same [`deadpool_postgres::Pool`];
//! `carepoint-server`'s composition root builds the pool once via
//! [`pool::build_pool`] and hands each repository its own `Arc`-free clone
//! (the pool itself is cheaply cloneable).

pub mod config;
pub mod facility_repo;
pub mod idempotency_repo;
pub mod pool;
pub mod procedure_repo;
mod rows;

pub use config::PostgresConfig;
pub use facility_repo::PostgresFacilityRepository;
pub use idempotency_repo::PostgresIdempotencyStore;
pub use pool::build_pool;
pub use procedure_repo::{PostgresEnrichmentRepository, PostgresFacilityProcedureRepository, PostgresProcedureRepository, PostgresWardRepository};
