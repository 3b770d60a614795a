//! Outbound HTTP client.
//!
//! A pooled hyper client that buffers the whole response body and reports
//! each request to the `InstrumentationHub`.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::{Request, StatusCode, Uri, Version};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use instrbench_core::error::{BenchError, Result};

use crate::telemetry::{finish_all, InstrumentationHub, RequestOutcome};

pub type OutboundRequest = Request<Empty<Bytes>>;

/// Buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub version: Version,
    pub body: Bytes,
}

impl HttpResponse {
    /// Fail unless the status is 2xx.
    pub fn ensure_success_status(&self) -> Result<&Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(BenchError::Status(self.status.as_u16()))
        }
    }
}

pub struct HttpClient {
    inner: Client<HttpConnector, Empty<Bytes>>,
    hub: Arc<InstrumentationHub>,
}

impl HttpClient {
    pub fn new(hub: Arc<InstrumentationHub>) -> Self {
        let inner = Client::builder(TokioExecutor::new()).build_http();
        Self { inner, hub }
    }

    pub fn hub(&self) -> &Arc<InstrumentationHub> {
        &self.hub
    }

    pub async fn get(&self, uri: &Uri) -> Result<HttpResponse> {
        let mut request = Request::get(uri.clone())
            .body(Empty::<Bytes>::new())
            .map_err(|e| BenchError::Request(format!("build request: {e}")))?;

        let scopes = self.hub.start(&mut request);
        let result = self.send(request).await;

        if !scopes.is_empty() {
            let outcome = match &result {
                Ok(resp) => RequestOutcome::Response {
                    status: resp.status,
                    version: resp.version,
                },
                Err(e) => RequestOutcome::Failed(e),
            };
            finish_all(scopes, &outcome);
        }
        result
    }

    async fn send(&self, request: OutboundRequest) -> Result<HttpResponse> {
        let response = self
            .inner
            .request(request)
            .await
            .map_err(|e| BenchError::Request(e.to_string()))?;

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| BenchError::Request(format!("read body: {e}")))?
            .to_bytes();

        Ok(HttpResponse {
            status: parts.status,
            version: parts.version,
            body,
        })
    }
}
