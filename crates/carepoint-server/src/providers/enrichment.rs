//! HTTP-backed [`EnrichmentProvider`]. Optional:
//! the composition root only builds one when `enrichment_provider_url` is
//! configured.

use std::time::Duration;

use async_trait::async_trait;
use carepoint_core::capability::{EnrichmentContext, EnrichmentOutput, EnrichmentProvider};
use carepoint_core::error::EnrichmentError;
use serde::Serialize;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpEnrichmentProvider {
    client: reqwest::Client,
    base_url: String,
    model_identifier: String,
}

impl HttpEnrichmentProvider {
    pub fn new(base_url: impl Into<String>, model_identifier: impl Into<String>) -> Self {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().expect("reqwest client builder is infallible here");
        Self { client, base_url: base_url.into(), model_identifier: model_identifier.into() }
    }
}

#[derive(Debug, Serialize)]
struct EnrichRequest<'a> {
    procedure_name: &'a str,
    category: Option<&'a str>,
}

#[async_trait]
impl EnrichmentProvider for HttpEnrichmentProvider {
    async fn enrich(&self, procedure_name: &str, context: &EnrichmentContext) -> Result<EnrichmentOutput, EnrichmentError> {
        let body = EnrichRequest { procedure_name, category: context.category.as_deref() };

        let response = self
            .client
            .post(format!("{}/enrich", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|err| EnrichmentError::Unavailable { message: err.to_string() })?;

        if !response.status().is_success() {
            return Err(EnrichmentError::Failed { message: format!("enrichment provider returned {}", response.status()) });
        }

        response.json().await.map_err(|err| EnrichmentError::Failed { message: err.to_string() })
    }

    fn model_identifier(&self) -> &str {
        &self.model_identifier
    }
}
