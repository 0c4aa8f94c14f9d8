//! Domain types and capability traits for the Carepoint price-discovery core.
//!
//! This crate has no knowledge of Redis, Postgres, or any particular search
//! engine. It defines:
//!
//! - [`model`] — the entities in the transactional store (Facility, Procedure, ...)
//! - [`ids`] — stable newtype identifiers
//! - [`error`] — the closed error hierarchy shared by every downstream crate
//! - [`capability`] — the trait boundaries (cache, search, store, geocoding,
//!   enrichment, provider feed) that concrete backends implement and that the
//!   ingestion coordinator and query resolver depend on as `Arc<dyn Trait>`
//!
//! Keeping these in one dependency-free crate is what makes the rest of the
//! workspace a DAG: `carepoint-cache`, `carepoint-search`, `carepoint-store`
//! and `carepoint-geo` each depend on `carepoint-core` and implement its
//! traits, but never on each other.

pub mod capability;
pub mod error;
pub mod ids;
pub mod model;
pub mod provider;
pub mod query;

pub use error::{CoreError, CoreResult};
pub use ids::{FacilityId, IdempotencyKey, ProcedureId};
