//! HTTP client for the listing API
//!
//! [`ApiClient`] talks to the resource endpoints; [`ListFetcher`] is the seam
//! paginated lists fetch through, so tests can script responses.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::client::query::QueryRequest;
use crate::config::Config;
use crate::models::{ListResponse, Resource, SingleResponse};

/// Errors raised while talking to the API
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport or decoding failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with an error envelope
    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}

impl ClientError {
    /// Whether the API reported a missing record
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Api { status: 404, .. })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Source of list pages
#[async_trait]
pub trait ListFetcher: Send + Sync {
    async fn fetch(&self, request: QueryRequest) -> Result<ListResponse<Value>, ClientError>;
}

/// Client for the resource endpoints
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client for `base_url` (scheme, host and API prefix)
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("waldo-admin/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Client pointed at the API described by `config`
    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        let base_url = format!(
            "{}/{}",
            config.client.base_url.trim_end_matches('/'),
            config.api.prefix.trim_matches('/')
        );
        Self::new(
            base_url,
            config.api.token.clone(),
            Duration::from_secs(config.client.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn resource_url(&self, resource: Resource) -> String {
        format!("{}/{}", self.base_url, resource)
    }

    fn entry_url(&self, resource: Resource, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, resource, urlencoding::encode(id))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// One page of a resource
    pub async fn list(&self, resource: Resource, request: &QueryRequest) -> Result<ListResponse<Value>, ClientError> {
        let url = format!("{}?{}", self.resource_url(resource), request.to_query_string());
        debug!("GET {}", url);
        let response = self.http.get(&url).send().await?;
        decode(response).await
    }

    /// One record by id or slug
    pub async fn get(&self, resource: Resource, id: &str) -> Result<Value, ClientError> {
        let response = self.http.get(self.entry_url(resource, id)).send().await?;
        Ok(decode::<SingleResponse<Value>>(response).await?.data)
    }

    pub async fn create(&self, resource: Resource, data: Value) -> Result<Value, ClientError> {
        let builder = self.http.post(self.resource_url(resource)).json(&json!({ "data": data }));
        let response = self.authorize(builder).send().await?;
        Ok(decode::<SingleResponse<Value>>(response).await?.data)
    }

    pub async fn update(&self, resource: Resource, id: &str, data: Value) -> Result<Value, ClientError> {
        let builder = self.http.put(self.entry_url(resource, id)).json(&json!({ "data": data }));
        let response = self.authorize(builder).send().await?;
        Ok(decode::<SingleResponse<Value>>(response).await?.data)
    }

    pub async fn delete(&self, resource: Resource, id: &str) -> Result<Value, ClientError> {
        let builder = self.http.delete(self.entry_url(resource, id));
        let response = self.authorize(builder).send().await?;
        Ok(decode::<SingleResponse<Value>>(response).await?.data)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body = response.text().await.unwrap_or_default();
    Err(api_error(status, &body))
}

fn api_error(status: StatusCode, body: &str) -> ClientError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => ClientError::Api {
            status: status.as_u16(),
            code: envelope.error.code,
            message: envelope.error.message,
        },
        Err(_) => ClientError::Api {
            status: status.as_u16(),
            code: "HTTP_ERROR".to_string(),
            message: status
                .canonical_reason()
                .unwrap_or("Unexpected response")
                .to_string(),
        },
    }
}

/// Fetches pages of one resource through an [`ApiClient`]
pub struct ResourceFetcher {
    client: Arc<ApiClient>,
    resource: Resource,
}

impl ResourceFetcher {
    pub fn new(client: Arc<ApiClient>, resource: Resource) -> Self {
        Self { client, resource }
    }
}

#[async_trait]
impl ListFetcher for ResourceFetcher {
    async fn fetch(&self, request: QueryRequest) -> Result<ListResponse<Value>, ClientError> {
        self.client.list(self.resource, &request).await
    }
}
