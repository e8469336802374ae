//! HTTP front end.
//!
//! # Responsibilities
//! - Create the Axum router: every method and path goes to one handler
//! - Wire up middleware (tracing, request ID)
//! - Bind to the listener and shut down gracefully
//! - Hand each request to a worker and relay the reply

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    Router,
};
use http_body_util::LengthLimitError;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::response;
use crate::ipc::RequestEnvelope;
use crate::observability::metrics;
use crate::pool::WorkerPool;

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<WorkerPool>,
    pub reply_timeout: Duration,
    pub max_body_size: usize,
}

impl AppState {
    pub fn new(config: &ProxyConfig, pool: WorkerPool) -> Self {
        Self {
            pool: Arc::new(pool),
            reply_timeout: Duration::from_secs(config.timeouts.reply_secs),
            max_body_size: config.limits.max_body_size,
        }
    }
}

/// HTTP server for the front end.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create the server; it owns the pool from here on.
    pub fn new(config: &ProxyConfig, pool: WorkerPool) -> Self {
        Self::with_state(AppState::new(config, pool))
    }

    pub fn with_state(state: AppState) -> Self {
        Self {
            router: build_router(state),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain open requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
fn build_router(state: AppState) -> Router {
    Router::new()
        .fallback(distribute)
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Main front-end handler.
async fn distribute(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();

    let response = match forward(&state, request).await {
        Ok(response) => response,
        Err(e) => {
            match &e {
                ProxyError::NoWorkersAvailable | ProxyError::ReplyTimeout(_) => {
                    tracing::warn!(error = %e, "Request failed")
                }
                ProxyError::WorkerExited(_)
                | ProxyError::WorkerUnavailable(_)
                | ProxyError::MalformedReply => tracing::error!(error = %e, "Request failed"),
                _ => tracing::debug!(error = %e, "Request failed"),
            }
            e.into_response()
        }
    };

    metrics::record_request(response.status().as_u16(), start);
    response
}

async fn forward(state: &AppState, request: Request<Body>) -> Result<Response, ProxyError> {
    // Checked before the body is read so an empty pool costs nothing.
    if state.pool.size() == 0 {
        return Err(ProxyError::NoWorkersAvailable);
    }

    let (parts, body) = request.into_parts();
    let body = to_bytes(body, state.max_body_size)
        .await
        .map_err(|e| body_error(e, state.max_body_size))?;

    let envelope = RequestEnvelope::from_parts(&parts, body);
    let id = envelope.id;

    let worker = state.pool.pick_worker().ok_or(ProxyError::NoWorkersAvailable)?;
    tracing::debug!(
        request_id = %id,
        worker = worker.index(),
        method = %parts.method,
        url = %envelope.url,
        "Dispatching request"
    );

    let reply = tokio::time::timeout(state.reply_timeout, worker.dispatch(envelope))
        .await
        .map_err(|_| ProxyError::ReplyTimeout(state.reply_timeout.as_secs()))??;

    response::from_reply(reply)
}

/// Tell an over-limit body apart from one the client failed to deliver.
fn body_error(error: axum::Error, limit: usize) -> ProxyError {
    let mut source: Option<&(dyn StdError + 'static)> = Some(&error);
    while let Some(cause) = source {
        if cause.is::<LengthLimitError>() {
            tracing::debug!(limit, "Request body over limit");
            return ProxyError::PayloadTooLarge;
        }
        source = cause.source();
    }

    tracing::debug!(error = %error, "Failed to read request body");
    ProxyError::RequestBody(error.to_string())
}
