//! Client side of the rendering service.
//!
//! The directory never renders anything itself. Capability documents,
//! passthrough operations and the direct-render fallback are all forwarded
//! to a renderer behind this trait.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;

use s100_common::{DirectoryError, DirectoryResult, ProductType, ServiceType};

/// A request forwarded to the renderer.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub product_type: ProductType,
    pub service_type: ServiceType,
    /// Original query parameters, in order.
    pub params: Vec<(String, String)>,
    /// XML body of a POST request.
    pub body: Option<Bytes>,
}

/// What the renderer sent back.
#[derive(Debug, Clone)]
pub struct RenderedResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Bytes,
}

impl RenderedResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> DirectoryResult<RenderedResponse>;
}

/// Forwards requests to `{base_url}/{product}/{service}` over HTTP.
pub struct HttpRenderer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRenderer {
    pub fn new(base_url: &str, timeout: Duration) -> DirectoryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DirectoryError::InternalError(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, request: &RenderRequest) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            request.product_type.code().to_lowercase(),
            request.service_type.code().to_lowercase()
        )
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn render(&self, request: &RenderRequest) -> DirectoryResult<RenderedResponse> {
        let url = self.url_for(request);
        debug!(url = %url, "Forwarding to renderer");

        let builder = match &request.body {
            Some(body) => self
                .client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/xml")
                .body(body.clone()),
            None => self.client.get(&url),
        };

        let response = builder
            .query(&request.params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DirectoryError::Timeout
                } else {
                    DirectoryError::RenderError(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| DirectoryError::RenderError(e.to_string()))?;

        Ok(RenderedResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Stand-in used when no renderer is configured.
pub struct UnavailableRenderer;

#[async_trait]
impl Renderer for UnavailableRenderer {
    async fn render(&self, _request: &RenderRequest) -> DirectoryResult<RenderedResponse> {
        Err(DirectoryError::ServiceUnavailable(
            "no renderer configured".to_string(),
        ))
    }
}
