//! Upstream content API client
//!
//! The pipeline calls [`Fetcher::fetch`] on a cache miss. No retries happen
//! here: one call, one attempt per upstream path.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::UpstreamError;
use crate::resource::{RequestDescriptor, UpstreamTarget};

/// Raw upstream response body, as cached.
pub type RawPayload = String;

/// Retrieves raw content for a descriptor.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, descriptor: &RequestDescriptor) -> Result<RawPayload, UpstreamError>;
}

/// reqwest-backed fetcher for a JSON content API.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    base: String,
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher rooted at `base`; every request is bounded by `timeout`.
    pub fn new(base: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::transport(e.to_string()))?;

        let base = base.into();
        info!("Created upstream client for {}", base);
        Ok(Self { base, client })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn get(
        &self,
        path: &str,
        query: &BTreeMap<String, String>,
    ) -> Result<RawPayload, UpstreamError> {
        let url = self.url(path);
        debug!(url = %url, "Fetching from upstream");

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| UpstreamError::transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::transport(e.to_string()))?;

        if !status.is_success() {
            return Err(UpstreamError::with_status(status.as_u16(), body));
        }
        Ok(body)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, descriptor: &RequestDescriptor) -> Result<RawPayload, UpstreamError> {
        match &descriptor.target {
            UpstreamTarget::Path(path) => self.get(path, &descriptor.query).await,
            UpstreamTarget::Multi(sources) => {
                let mut combined = Map::new();
                for source in sources {
                    let body = self.get(&source.path, &descriptor.query).await?;
                    combined.insert(source.name.clone(), embed(body));
                }
                Ok(Value::Object(combined).to_string())
            }
            UpstreamTarget::Static { resource } => Err(UpstreamError::transport(format!(
                "static resource {resource} is never fetched"
            ))),
        }
    }
}

/// Multi members are embedded as parsed JSON so the combined payload stays
/// one JSON document; non-JSON bodies are kept as strings.
pub(crate) fn embed(body: String) -> Value {
    serde_json::from_str(&body).unwrap_or(Value::String(body))
}
