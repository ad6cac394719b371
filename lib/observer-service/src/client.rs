//! Outbound metadata-fetch client
//!
//! The resource router talks to mesh peers through the `MetaFetch` trait;
//! the production implementation POSTs JSON over a pooled hyper client
//! with connect and request timeouts.

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::{body::Bytes, header, Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::tokio::TokioExecutor;
use observer_api::{MetaResourcesRequest, MetaResourcesResponse};
use observer_core::CoreError;
use std::time::Duration;
use tokio::time::timeout as tokio_timeout;
use tracing::{debug, warn};

/// RPC path peers expose for resource metadata.
const META_RESOURCES_PATH: &str = "/meta.v1.MetaService/GetResources";

/// Performs the single-hop metadata fetch against a peer's service
/// address.
#[async_trait]
pub trait MetaFetch: Send + Sync {
    async fn fetch_resources(
        &self,
        addr: &str,
        request: &MetaResourcesRequest,
    ) -> Result<MetaResourcesResponse, CoreError>;
}

/// HTTP implementation of [`MetaFetch`] with connection pooling.
pub struct HttpMetaClient {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl HttpMetaClient {
    pub fn new(timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeout));
        connector.set_keepalive(Some(Duration::from_secs(30)));

        let client = Client::builder(TokioExecutor::new()).build::<_, Full<Bytes>>(connector);

        Self { client, timeout }
    }
}

#[async_trait]
impl MetaFetch for HttpMetaClient {
    async fn fetch_resources(
        &self,
        addr: &str,
        request: &MetaResourcesRequest,
    ) -> Result<MetaResourcesResponse, CoreError> {
        let url = format!("http://{}{}", addr, META_RESOURCES_PATH);
        let uri: Uri = url
            .parse()
            .map_err(|e| CoreError::Internal(format!("invalid peer address {:?}: {}", addr, e)))?;

        let body = serde_json::to_vec(request)
            .map_err(|e| CoreError::Internal(format!("failed to encode request: {}", e)))?;

        let http_request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| CoreError::Internal(format!("failed to build request: {}", e)))?;

        debug!("Fetching resources from {}", url);

        let response = match tokio_timeout(self.timeout, self.client.request(http_request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("Failed to reach peer {}: {}", addr, e);
                return Err(CoreError::Unavailable(format!(
                    "failed to connect to peer {}: {}",
                    addr, e
                )));
            }
            Err(_) => {
                warn!("Request to peer {} timed out", addr);
                return Err(CoreError::Unavailable(format!(
                    "request to peer {} timed out after {:?}",
                    addr, self.timeout
                )));
            }
        };

        let (parts, body) = response.into_parts();
        let bytes = body
            .collect()
            .await
            .map_err(|e| CoreError::Unavailable(format!("failed to read peer response: {}", e)))?
            .to_bytes();

        if !parts.status.is_success() {
            return Err(CoreError::Internal(format!(
                "peer returned status {}: {}",
                parts.status,
                String::from_utf8_lossy(&bytes)
            )));
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| CoreError::Internal(format!("failed to parse peer response: {}", e)))
    }
}
