//! Reply envelope to client response.
//!
//! # Design Decisions
//! - A failure reply becomes its own status code with the error text as body
//! - A success reply keeps the upstream status (200 when absent) and headers
//! - Anything that breaks the reply contract is a logged 500, never relayed

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};

use crate::error::ProxyError;
use crate::ipc::{ReplyEnvelope, ReplyOutcome};

/// Turn a worker's reply into the response sent to the client.
pub fn from_reply(reply: ReplyEnvelope) -> Result<Response, ProxyError> {
    let id = reply.id;
    match reply.outcome {
        ReplyOutcome::Failure { error_code, error } => {
            let status = error_code
                .parse::<u16>()
                .ok()
                .and_then(|code| StatusCode::from_u16(code).ok())
                .ok_or_else(|| {
                    tracing::error!(
                        request_id = %id,
                        error_code = %error_code,
                        "Reply carries an invalid error code"
                    );
                    ProxyError::MalformedReply
                })?;
            Ok(text_response(status, error))
        }
        ReplyOutcome::Success {
            data,
            status,
            headers,
            body_encoding,
        } => {
            let status = match status {
                None => StatusCode::OK,
                Some(code) => StatusCode::from_u16(code).map_err(|_| {
                    tracing::error!(
                        request_id = %id,
                        status = code,
                        "Reply carries an invalid status"
                    );
                    ProxyError::MalformedReply
                })?,
            };
            let body = body_encoding.decode(&data).map_err(|e| {
                tracing::error!(
                    request_id = %id,
                    error = %e,
                    "Reply carries an undecodable body"
                );
                ProxyError::MalformedReply
            })?;

            let mut response = Response::new(Body::from(body));
            *response.status_mut() = status;
            headers.write_into(response.headers_mut());
            Ok(response)
        }
    }
}

fn text_response(status: StatusCode, body: String) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
