//! Ingestion tuning parameters.

use serde::{Deserialize, Serialize};

fn default_idempotency_ttl_minutes() -> u32 {
    1440
}
fn default_ingest_timeout_seconds() -> u64 {
    120
}
fn default_startup_retry_cap() -> u32 {
    5
}
fn default_enrichment_retry_cap() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Page size requested from the provider; `0` defers to the provider's
    /// own default.
    #[serde(default)]
    pub provider_ingest_page_size: u32,
    #[serde(default = "default_idempotency_ttl_minutes")]
    pub provider_ingestion_idempotency_ttl_minutes: u32,
    #[serde(default)]
    pub provider_ingest_on_start: bool,
    /// `0` disables the periodic sync; the scheduler in `carepoint-server`
    /// only ticks when this is nonzero.
    #[serde(default)]
    pub provider_ingest_interval_minutes: u32,
    #[serde(default = "default_ingest_timeout_seconds")]
    pub provider_ingest_timeout_seconds: u64,
    /// Rows with `enrichment_version` below this are (re)enrichment
    /// candidates.
    #[serde(default)]
    pub enrichment_target_version: i32,
    #[serde(default = "default_enrichment_retry_cap")]
    pub enrichment_retry_cap: u32,
    /// Startup sync retry cap before giving up.
    #[serde(default = "default_startup_retry_cap")]
    pub startup_retry_cap: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            provider_ingest_page_size: 0,
            provider_ingestion_idempotency_ttl_minutes: default_idempotency_ttl_minutes(),
            provider_ingest_on_start: false,
            provider_ingest_interval_minutes: 0,
            provider_ingest_timeout_seconds: default_ingest_timeout_seconds(),
            enrichment_target_version: 0,
            enrichment_retry_cap: default_enrichment_retry_cap(),
            startup_retry_cap: default_startup_retry_cap(),
        }
    }
}

impl IngestConfig {
    pub fn for_testing() -> Self {
        Self { provider_ingest_page_size: 10, provider_ingestion_idempotency_ttl_minutes: 60, ..Default::default() }
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.provider_ingestion_idempotency_ttl_minutes == 0 {
            errors.push("provider_ingestion_idempotency_ttl_minutes must be > 0".to_string());
        }
        if self.provider_ingest_timeout_seconds == 0 {
            errors.push("provider_ingest_timeout_seconds must be > 0".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
