//! Per-request error taxonomy.
//!
//! Every failure that ends a single request is a [`ProxyError`]. Workers ship
//! them back as failure replies (`errorCode` + `error`); the front end turns
//! them into a status code and a plain-text body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    /// The pool has no live workers.
    #[error("No workers available")]
    NoWorkersAvailable,

    /// A worker reply did not match the reply envelope contract.
    #[error("Internal Server Error")]
    MalformedReply,

    /// No rule matched the request path.
    #[error("Rule not found for path: {0}")]
    RouteNotFound(String),

    /// A rule matched but its upstream id is not defined.
    #[error("Upstream not found for rule: {0}")]
    UpstreamNotFound(String),

    /// Connecting to or reading from the upstream failed.
    #[error("Proxy request failed: {0}")]
    ProxyTransport(String),

    /// A worker received a message that is not a valid request envelope.
    #[error("Internal server error: {0}")]
    MalformedRequestEnvelope(String),

    /// Unexpected failure inside a worker's request handler.
    #[error("Internal server error: {0}")]
    Internal(String),

    /// The chosen worker can no longer accept requests.
    #[error("Worker {0} is unavailable")]
    WorkerUnavailable(usize),

    /// The worker went away while this request was in flight.
    #[error("Worker {0} exited before replying")]
    WorkerExited(usize),

    #[error("Worker did not reply within {0} seconds")]
    ReplyTimeout(u64),

    #[error("Request body too large")]
    PayloadTooLarge,

    /// The client's body could not be read (disconnect, bad framing).
    #[error("Failed to read request body: {0}")]
    RequestBody(String),
}

impl ProxyError {
    /// HTTP status the client observes for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::ReplyTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::RequestBody(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ProxyError::RouteNotFound("/x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ProxyError::UpstreamNotFound("/x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ProxyError::NoWorkersAvailable.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ProxyError::ReplyTimeout(1).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ProxyError::RequestBody("reset".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn messages_name_the_failure() {
        assert_eq!(
            ProxyError::RouteNotFound("/unknown".into()).to_string(),
            "Rule not found for path: /unknown"
        );
        assert!(ProxyError::ProxyTransport("connection refused".into())
            .to_string()
            .starts_with("Proxy request failed"));
    }
}
