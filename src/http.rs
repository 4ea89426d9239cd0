//! HTTP client for the console REST API
//!
//! This module wraps `reqwest` with what every console call needs:
//! - bearer token authentication
//! - a per-request `X-Request-Id` that also appears in the logs
//! - JSON bodies in both directions
//! - status checking that keeps the response body for diagnostics
//!
//! Calls are not retried; a failed call is reported to the caller as-is.

use anyhow::{anyhow, Context as _, Result};
use reqwest::{header, Client, ClientBuilder, Method, Url};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Context;
use crate::error::ApiError;
use crate::models::Resource;
use crate::pagination::{Page, PageRequest};

const API_PREFIX: &str = "api/v1/";
const USER_AGENT: &str = concat!("consolectl/", env!("CARGO_PKG_VERSION"));

/// Client for the console's REST endpoints
///
/// # Examples
///
/// ```no_run
/// use consolectl::config::{Config, Context, Overrides};
/// use consolectl::http::ApiClient;
/// use consolectl::models::Resource;
/// use consolectl::pagination::PageRequest;
///
/// # async fn example() -> anyhow::Result<()> {
/// let ctx = Context::from_parts(
///     Config::default(),
///     Config::default(),
///     Overrides { api_key: Some("secret".into()), ..Default::default() },
/// )?;
/// let client = ApiClient::new(&ctx)?;
/// let page = client.list(Resource::Users, PageRequest { page: 1, per_page: 50 }).await?;
/// println!("{} users in total", page.total);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl ApiClient {
    pub fn new(ctx: &Context) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(ctx.timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: ctx.base_url.clone(),
            api_key: ctx.api_key.clone(),
        })
    }

    /// Fetches one page of a collection
    pub async fn list(&self, resource: Resource, page: PageRequest) -> Result<Page<Value>> {
        let url = self.endpoint(resource, None)?;
        let query = [
            ("page", page.page.to_string()),
            ("per_page", page.per_page.to_string()),
        ];
        let body = self
            .send::<()>(Method::GET, url, &query, None)
            .await?
            .unwrap_or(Value::Null);

        let path = resource.path().to_string();
        let items = match body.get("items") {
            Some(Value::Array(items)) => items.clone(),
            _ => {
                return Err(ApiError::MalformedListing {
                    path,
                    field: "items",
                }
                .into())
            }
        };
        let total = body
            .get("total")
            .and_then(Value::as_u64)
            .ok_or(ApiError::MalformedListing {
                path,
                field: "total",
            })?;

        Ok(Page { items, total })
    }

    pub async fn get(&self, resource: Resource, id: &str) -> Result<Value> {
        let url = self.endpoint(resource, Some(id))?;
        Ok(self
            .send::<()>(Method::GET, url, &[], None)
            .await?
            .unwrap_or(Value::Null))
    }

    pub async fn create<B: Serialize + ?Sized>(&self, resource: Resource, body: &B) -> Result<Value> {
        let url = self.endpoint(resource, None)?;
        Ok(self
            .send(Method::POST, url, &[], Some(body))
            .await?
            .unwrap_or(Value::Null))
    }

    pub async fn update<B: Serialize + ?Sized>(
        &self,
        resource: Resource,
        id: &str,
        body: &B,
    ) -> Result<Value> {
        let url = self.endpoint(resource, Some(id))?;
        Ok(self
            .send(Method::PUT, url, &[], Some(body))
            .await?
            .unwrap_or(Value::Null))
    }

    pub async fn delete(&self, resource: Resource, id: &str) -> Result<()> {
        let url = self.endpoint(resource, Some(id))?;
        self.send::<()>(Method::DELETE, url, &[], None).await?;
        Ok(())
    }

    fn endpoint(&self, resource: Resource, id: Option<&str>) -> Result<Url> {
        let mut url = self
            .base_url
            .join(API_PREFIX)
            .context("joining API prefix to base URL")?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow!("base URL {} cannot carry a path", self.base_url))?;
            segments.pop_if_empty().push(resource.path());
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    /// Sends one request and decodes the JSON body, if there is one
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<Option<Value>> {
        let request_id = Uuid::new_v4();
        let path = url.path().to_string();
        debug!("{} {} (request {})", method, path, request_id);

        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(&self.api_key)
            .header(header::ACCEPT, "application/json")
            .header("X-Request-Id", request_id.to_string());
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send {} {}", method, path))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            warn!("{} {} returned {} (request {})", method, path, status, request_id);
            return Err(ApiError::Status {
                method: method.to_string(),
                path,
                status: status.as_u16(),
                body: text,
            }
            .into());
        }

        if text.trim().is_empty() {
            return Ok(None);
        }
        let json = serde_json::from_str(&text)
            .with_context(|| format!("Failed to decode response from {} {}", method, path))?;
        Ok(Some(json))
    }
}
