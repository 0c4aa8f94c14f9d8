//! Pure, deterministic text transforms: service-name normalization
//! and query understanding.
//!
//! Neither module performs I/O beyond loading its concept tables at
//! startup; both are safe to call from a hot request path with no
//! allocation surprises beyond the output itself.

pub mod query_understanding;
pub mod service_name;
pub mod tables;

pub use query_understanding::ConceptQueryUnderstanding;
pub use service_name::{normalize, NormalizedName};
pub use tables::{NormalizationTables, QueryTables};
