//! Per-envelope request handling.
//!
//! # States
//! ```text
//! Received → (validate) → Resolved → Proxying → Replied
//!                       ↘ RouteNotFound / UpstreamNotFound → Replied
//! ```
//!
//! # Design Decisions
//! - Method, headers, body and path are forwarded; status, headers and body
//!   come back
//! - The upstream body is buffered in full before replying
//! - Every outbound call has a connect and a response deadline

use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{
        header::{self, HeaderValue},
        uri::Scheme,
        Method, Request, Uri,
    },
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::ipc::{
    correlation_id, HeaderFields, ReplyEnvelope, RequestEnvelope, RequestId, X_REQUEST_ID,
};
use crate::routing::{RoutingTable, Upstream};

/// A worker's request handler. Owns its routing table.
pub struct Worker {
    table: RoutingTable,
    client: Client<HttpConnector, Body>,
    upstream_timeout: Duration,
}

impl Worker {
    pub fn new(config: &ProxyConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            table: RoutingTable::from_config(&config.server),
            client,
            upstream_timeout: Duration::from_secs(config.timeouts.upstream_secs),
        }
    }

    /// Handle one raw inbound message.
    ///
    /// Returns `None` only when the message is so malformed that no request
    /// id can be recovered to address a reply to.
    pub async fn handle_message(self: &Arc<Self>, message: &str) -> Option<ReplyEnvelope> {
        let envelope = match RequestEnvelope::parse(message) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(error = %e, "Rejected malformed request envelope");
                let Some(id) = correlation_id(message) else {
                    tracing::error!("Malformed envelope carries no request id; dropping it");
                    return None;
                };
                return Some(ReplyEnvelope::failure(
                    id,
                    &ProxyError::MalformedRequestEnvelope(e.to_string()),
                ));
            }
        };

        let id = envelope.id;
        let worker = Arc::clone(self);
        Some(caught(id, async move { worker.handle(envelope).await }).await)
    }

    /// Resolve and proxy a validated envelope.
    pub async fn handle(&self, envelope: RequestEnvelope) -> ReplyEnvelope {
        let id = envelope.id;
        match self.proxy(&envelope).await {
            Ok(reply) => reply,
            Err(e) => {
                match &e {
                    ProxyError::RouteNotFound(_) => {
                        tracing::debug!(request_id = %id, url = %envelope.url, "No rule matched")
                    }
                    _ => tracing::warn!(
                        request_id = %id,
                        url = %envelope.url,
                        error = %e,
                        "Request failed"
                    ),
                }
                ReplyEnvelope::failure(id, &e)
            }
        }
    }

    async fn proxy(&self, envelope: &RequestEnvelope) -> Result<ReplyEnvelope, ProxyError> {
        let upstream = self.table.resolve(&envelope.url)?;

        tracing::debug!(
            request_id = %envelope.id,
            method = %envelope.method,
            url = %envelope.url,
            upstream = %upstream.id,
            "Proxying request"
        );

        self.forward(upstream, envelope).await
    }

    async fn forward(
        &self,
        upstream: &Upstream,
        envelope: &RequestEnvelope,
    ) -> Result<ReplyEnvelope, ProxyError> {
        let request = build_upstream_request(upstream, envelope)?;

        let response = tokio::time::timeout(self.upstream_timeout, self.client.request(request));
        let response = match response.await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(ProxyError::ProxyTransport(error_chain(&e))),
            Err(_) => {
                return Err(ProxyError::ProxyTransport(format!(
                    "upstream {} did not respond within {} seconds",
                    upstream.id,
                    self.upstream_timeout.as_secs()
                )))
            }
        };

        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), usize::MAX);
        let bytes = tokio::time::timeout(self.upstream_timeout, body)
            .await
            .map_err(|_| ProxyError::ProxyTransport("timed out reading upstream body".to_string()))?
            .map_err(|e| ProxyError::ProxyTransport(error_chain(&e)))?;

        tracing::debug!(
            request_id = %envelope.id,
            upstream = %upstream.id,
            status = %parts.status,
            bytes = bytes.len(),
            "Upstream responded"
        );

        Ok(ReplyEnvelope::success(
            envelope.id,
            parts.status,
            HeaderFields::from_header_map(&parts.headers),
            &bytes,
        ))
    }
}

/// Await `handler` on its own task; a panic becomes an `Internal` failure
/// reply for `id` and the worker keeps serving.
async fn caught<F>(id: RequestId, handler: F) -> ReplyEnvelope
where
    F: Future<Output = ReplyEnvelope> + Send + 'static,
{
    match tokio::spawn(handler).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(request_id = %id, error = %e, "Request handler failed");
            ReplyEnvelope::failure(id, &ProxyError::Internal("request handler failed".to_string()))
        }
    }
}

fn build_upstream_request(
    upstream: &Upstream,
    envelope: &RequestEnvelope,
) -> Result<Request<Body>, ProxyError> {
    let method = Method::from_bytes(envelope.method.as_bytes()).map_err(|_| {
        ProxyError::MalformedRequestEnvelope(format!("invalid method {:?}", envelope.method))
    })?;

    let path = if envelope.url.is_empty() { "/" } else { envelope.url.as_str() };
    let uri = Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(upstream.authority.clone())
        .path_and_query(path)
        .build()
        .map_err(|e| ProxyError::MalformedRequestEnvelope(e.to_string()))?;

    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(headers) = builder.headers_mut() {
        envelope.headers.write_into(headers);
        // Let the client derive Host from the upstream authority.
        headers.remove(header::HOST);
        if !headers.contains_key(X_REQUEST_ID) {
            if let Ok(value) = HeaderValue::from_str(&envelope.id.to_string()) {
                headers.insert(X_REQUEST_ID, value);
            }
        }
    }

    let body = envelope
        .body_bytes()
        .map_err(|e| ProxyError::MalformedRequestEnvelope(e.to_string()))?
        .map(Body::from)
        .unwrap_or_else(Body::empty);
    builder
        .body(body)
        .map_err(|e| ProxyError::MalformedRequestEnvelope(e.to_string()))
}

/// Render an error and its sources, e.g.
/// `client error (Connect): tcp connect error: Connection refused`.
fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
