//! Request and reply envelopes.
//!
//! One [`RequestEnvelope`] travels from the front end to a worker per inbound
//! HTTP request; exactly one [`ReplyEnvelope`] with the same [`RequestId`]
//! comes back. Both are serialized as camelCase JSON.
//!
//! Bodies travel as JSON strings. UTF-8 bodies are carried verbatim; any
//! other bytes are base64-encoded and flagged with `bodyEncoding: "base64"`.

use std::collections::BTreeMap;
use std::fmt;

use axum::http::{
    header::{self, HeaderName, HeaderValue},
    request, HeaderMap, StatusCode,
};
use axum::body::Bytes;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::ProxyError;

/// Request id header shared by the front end, workers and upstreams.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Headers that describe a single connection and are never relayed.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Correlation token carried by a request and its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a new unique request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Reuse an inbound `x-request-id` when it is a UUID.
    pub fn from_header(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(X_REQUEST_ID)?
            .to_str()
            .ok()
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .map(Self)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("invalid envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid envelope url {0:?}: must be empty or start with '/'")]
    InvalidUrl(String),

    #[error("invalid base64 body: {0}")]
    InvalidBody(#[from] base64::DecodeError),
}

/// How a body string maps back to bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    #[default]
    Utf8,
    Base64,
}

impl BodyEncoding {
    /// Encode `bytes` losslessly: text as-is, anything else as base64.
    pub fn encode(bytes: &[u8]) -> (String, Self) {
        match std::str::from_utf8(bytes) {
            Ok(text) => (text.to_owned(), Self::Utf8),
            Err(_) => (STANDARD.encode(bytes), Self::Base64),
        }
    }

    pub fn decode(self, body: &str) -> Result<Bytes, EnvelopeError> {
        match self {
            Self::Utf8 => Ok(Bytes::copy_from_slice(body.as_bytes())),
            Self::Base64 => Ok(Bytes::from(STANDARD.decode(body)?)),
        }
    }

    fn is_utf8(&self) -> bool {
        *self == Self::Utf8
    }
}

/// Header name to all of its values, as received.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderFields(BTreeMap<String, Vec<String>>);

impl HeaderFields {
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in headers {
            fields
                .entry(name.as_str().to_owned())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        Self(fields)
    }

    /// Append every relayable field to `headers`.
    ///
    /// Hop-by-hop headers and `content-length` are skipped: the body is
    /// re-framed on each hop. Names or values that are not valid HTTP are
    /// dropped.
    pub fn write_into(&self, headers: &mut HeaderMap) {
        for (name, values) in &self.0 {
            let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
                tracing::trace!(header = %name, "Dropping invalid header name");
                continue;
            };
            if is_hop_by_hop(&name) || name == header::CONTENT_LENGTH {
                continue;
            }
            for value in values {
                if let Ok(value) = HeaderValue::from_str(value) {
                    headers.append(name.clone(), value);
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Kind of request carried by an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    #[serde(rename = "HTTP")]
    Http,
}

/// A request's essentials, front end → worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    pub id: RequestId,
    pub request_type: RequestType,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HeaderFields,
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "BodyEncoding::is_utf8")]
    pub body_encoding: BodyEncoding,
    pub url: String,
}

fn default_method() -> String {
    "GET".to_string()
}

impl RequestEnvelope {
    /// Build an envelope from a buffered inbound request.
    ///
    /// The id is taken from `x-request-id` when that is a UUID, so client,
    /// front-end and worker logs share one id.
    pub fn from_parts(parts: &request::Parts, body: Bytes) -> Self {
        let (body, body_encoding) = if body.is_empty() {
            (None, BodyEncoding::Utf8)
        } else {
            let (text, encoding) = BodyEncoding::encode(&body);
            (Some(text), encoding)
        };

        Self {
            id: RequestId::from_header(&parts.headers).unwrap_or_default(),
            request_type: RequestType::Http,
            method: parts.method.to_string(),
            headers: HeaderFields::from_header_map(&parts.headers),
            body,
            body_encoding,
            url: parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_default(),
        }
    }

    /// Parse and validate a message received by a worker.
    pub fn parse(message: &str) -> Result<Self, EnvelopeError> {
        let envelope: Self = serde_json::from_str(message)?;
        if !envelope.url.is_empty() && !envelope.url.starts_with('/') {
            return Err(EnvelopeError::InvalidUrl(envelope.url));
        }
        envelope.body_bytes()?;
        Ok(envelope)
    }

    /// The request body as sent by the client.
    pub fn body_bytes(&self) -> Result<Option<Bytes>, EnvelopeError> {
        self.body
            .as_deref()
            .map(|body| self.body_encoding.decode(body))
            .transpose()
    }
}

/// A worker's answer, worker → front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub id: RequestId,
    #[serde(flatten)]
    pub outcome: ReplyOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyOutcome {
    Failure {
        #[serde(rename = "errorCode")]
        error_code: String,
        error: String,
    },
    Success {
        data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        #[serde(default, skip_serializing_if = "HeaderFields::is_empty")]
        headers: HeaderFields,
        #[serde(
            rename = "bodyEncoding",
            default,
            skip_serializing_if = "BodyEncoding::is_utf8"
        )]
        body_encoding: BodyEncoding,
    },
}

impl ReplyEnvelope {
    pub fn success(
        id: RequestId,
        status: StatusCode,
        headers: HeaderFields,
        body: impl AsRef<[u8]>,
    ) -> Self {
        let (data, body_encoding) = BodyEncoding::encode(body.as_ref());
        Self {
            id,
            outcome: ReplyOutcome::Success {
                data,
                status: Some(status.as_u16()),
                headers,
                body_encoding,
            },
        }
    }

    pub fn failure(id: RequestId, error: &ProxyError) -> Self {
        Self {
            id,
            outcome: ReplyOutcome::Failure {
                error_code: error.status_code().as_u16().to_string(),
                error: error.to_string(),
            },
        }
    }

    pub fn parse(message: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(message)?)
    }
}

/// Recover the correlation id from a message that failed full validation.
pub fn correlation_id(message: &str) -> Option<RequestId> {
    #[derive(Deserialize)]
    struct Correlation {
        id: RequestId,
    }

    serde_json::from_str::<Correlation>(message)
        .ok()
        .map(|c| c.id)
}
