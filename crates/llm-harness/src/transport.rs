//! Transport seam between the streaming pipeline and the HTTP client.
//!
//! `StreamingClient` takes any `Transport` at construction, so tests and
//! alternative HTTP stacks plug in without global registration. Dropping a
//! response's `body` releases the underlying connection.

use std::pin::Pin;

use futures::StreamExt as _;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::errors::{HarnessError, TransportError};
use crate::request::StreamRequest;

/// Ordered body chunks of a streaming response.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, TransportError>> + Send + 'static>>;

/// Status, headers and body of an opened stream.
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: ByteStream,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Issues a streaming HTTP POST.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and resolves once the status and headers arrived.
    async fn open_stream(&self, request: &StreamRequest)
    -> Result<TransportResponse, TransportError>;
}

/// `Transport` backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with the config's connect timeout.
    pub fn new(config: &ProviderConfig) -> Result<Self, HarnessError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| HarnessError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps an existing client (shared connection pool).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn open_stream(
        &self,
        request: &StreamRequest,
    ) -> Result<TransportResponse, TransportError> {
        let body = serde_json::to_vec(&request.body)
            .map_err(|e| TransportError::connect(format!("failed to encode request body: {e}")))?;

        let mut http_req = self.client.post(&request.url).body(body);
        let mut has_content_type = false;
        for (name, value) in &request.headers {
            has_content_type |= name.eq_ignore_ascii_case("content-type");
            http_req = http_req.header(name.as_str(), value.as_str());
        }
        if !has_content_type {
            http_req = http_req.header("content-type", "application/json");
        }

        debug!(url = %request.url, "sending streaming request");
        let response = http_req.send().await.map_err(|e| {
            TransportError::connect(format!("request to {} failed: {e}", request.url))
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::read(format!("body read failed: {e}"))));

        Ok(TransportResponse {
            status,
            headers,
            body: Box::pin(body),
        })
    }
}
