//! Shapes for the external provider data feed.
//!
//! The ingestion coordinator interprets these opaque fields; it never
//! assumes more structure than the provider actually sent.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One raw record from a provider page. Every field beyond `external_id`
/// and `facility_external_id` is optional because providers vary wildly in
/// what they report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderRecord {
    /// Stable id for this record within the provider's feed.
    pub external_id: String,
    pub facility_external_id: String,
    pub facility_name: String,
    pub service_name: String,
    pub price: f64,
    pub currency: String,
    pub is_available: Option<bool>,
    pub estimated_duration_minutes: Option<u32>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub tags: Vec<String>,
}

impl ProviderRecord {
    /// A stable fingerprint of the record's content, used to compute the
    /// ingestion idempotency key. Two records with identical content (for
    /// the same provider/page cursor) fingerprint identically.
    pub fn fingerprint(&self) -> String {
        format!(
            "{}|{}|{}|{}|{:.2}|{}",
            self.external_id, self.facility_external_id, self.facility_name, self.service_name, self.price, self.currency
        )
    }
}

/// A page of provider records plus the cursor for the next page, or `None`
/// when the provider reports "no more".
pub type ProviderPage = (Vec<ProviderRecord>, Option<String>);

/// Errors from the provider data source. HTTP 4xx-equivalents are
/// [`ProviderError::Permanent`] (not retried); 5xx-equivalents and
/// transport failures are [`ProviderError::Transient`] (retried with
/// bounded backoff).
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("permanent provider error: {message}")]
    Permanent { message: String },

    #[error("transient provider error: {message}")]
    Transient { message: String },
}
