//! HTTP-backed [`ProviderDataSource`]. Talks to
//! a paged JSON feed; the exact upstream rate-listing provider is an
//! implementation detail behind the capability boundary, mirroring
//! `carepoint-geo`'s `HttpGeoProvider`.

use std::time::Duration;

use async_trait::async_trait;
use carepoint_core::capability::{ProviderDataSource, ProviderError, ProviderPage, ProviderRecord};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ProviderPageResponse {
    records: Vec<ProviderRecord>,
    #[serde(default)]
    next_cursor: Option<String>,
}

pub struct HttpProviderDataSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProviderDataSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder().timeout(timeout).build().expect("reqwest client builder is infallible here");
        Self { client, base_url: base_url.into() }
    }
}

#[async_trait]
impl ProviderDataSource for HttpProviderDataSource {
    async fn list_records(&self, provider_id: &str, cursor: Option<&str>) -> Result<ProviderPage, ProviderError> {
        let mut query = vec![("provider_id".to_string(), provider_id.to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor".to_string(), cursor.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/records", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if status.is_client_error() {
            return Err(ProviderError::Permanent { message: format!("provider returned {status}") });
        }
        if status.is_server_error() {
            return Err(ProviderError::Transient { message: format!("provider returned {status}") });
        }

        let page: ProviderPageResponse = response.json().await.map_err(|err| ProviderError::Transient { message: err.to_string() })?;
        Ok((page.records, page.next_cursor))
    }
}

fn map_request_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() || err.is_connect() {
        ProviderError::Transient { message: err.to_string() }
    } else {
        ProviderError::Permanent { message: err.to_string() }
    }
}
