//! Geolocation provider: an HTTP-backed implementation plus a
//! cache-backed decorator with a long TTL.

pub mod cached;
pub mod http_provider;

pub use cached::CachedGeoProvider;
pub use http_provider::HttpGeoProvider;
