// ABOUTME: HTTP client for the Fairing REST API
// ABOUTME: Single-attempt requests; any non-success status is returned as a fatal error

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Request};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::models::{DataResponse, Page, PageRequest, Record};
use super::ResponsesApi;
use crate::error::ReplicationError;

/// Default Fairing API base URL
pub const DEFAULT_API_URL: &str = "https://app.fairing.co/api";

pub struct FairingClient {
    client: Client,
    api_base_url: String,
}

impl FairingClient {
    /// Create a client that sends `secret_token` as the raw `Authorization` header.
    pub fn new(
        api_base_url: &str,
        secret_token: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(secret_token).map_err(|_| {
            anyhow::anyhow!("secret_token contains characters not allowed in a header")
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path)
    }

    /// Build (but do not send) the request for one responses page.
    pub fn responses_request(&self, request: &PageRequest) -> Result<Request, ReplicationError> {
        let url = self.url("responses");
        self.client
            .get(&url)
            .query(&request.query_params())
            .build()
            .map_err(|source| ReplicationError::Request { url, source })
    }

    /// Fetch every survey question. The endpoint is not paginated.
    pub async fn fetch_questions(&self) -> Result<Vec<Record>, ReplicationError> {
        let url = self.url("questions");
        let request = self
            .client
            .get(&url)
            .build()
            .map_err(|source| ReplicationError::Request {
                url: url.clone(),
                source,
            })?;
        self.execute::<Vec<Record>>(request).await
    }

    async fn execute<T: DeserializeOwned>(&self, request: Request) -> Result<T, ReplicationError> {
        let url = request.url().to_string();
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|source| ReplicationError::Request {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ReplicationError::TransportFailure { status, url, body });
        }

        let envelope: DataResponse<T> = response
            .json()
            .await
            .map_err(|source| ReplicationError::Decode { url, source })?;

        Ok(envelope.data)
    }
}

impl ResponsesApi for FairingClient {
    async fn fetch_responses(&self, request: &PageRequest) -> Result<Page, ReplicationError> {
        let http_request = self.responses_request(request)?;
        let records = self.execute::<Vec<Record>>(http_request).await?;
        Ok(Page::new(records))
    }
}
