//! Upstream targets.
//!
//! An upstream's configured `url` is either a bare `host[:port]` or a plain
//! `http://` URL. Both are normalized to an authority the outbound client can
//! dial; any path on the URL is ignored because the request path is
//! forwarded as-is.

use std::str::FromStr;

use axum::http::uri::Authority;
use thiserror::Error;
use url::Url;

use crate::config::UpstreamConfig;

/// Why an upstream URL could not be turned into an address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("url must not be empty")]
    Empty,

    #[error("unsupported scheme {0:?} (only http is proxied)")]
    UnsupportedScheme(String),

    #[error("invalid url {url:?}: {reason}")]
    Invalid { url: String, reason: String },
}

/// A resolved backend host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    /// Upstream id from configuration.
    pub id: String,
    /// `host[:port]` to connect to.
    pub authority: Authority,
}

impl Upstream {
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, AddressError> {
        Ok(Self {
            id: config.id.clone(),
            authority: parse_address(&config.url)?,
        })
    }
}

/// Normalize an upstream `url` into an HTTP authority.
pub fn parse_address(raw: &str) -> Result<Authority, AddressError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AddressError::Empty);
    }

    let invalid = |reason: String| AddressError::Invalid {
        url: raw.to_string(),
        reason,
    };

    if raw.contains("://") {
        let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
        if url.scheme() != "http" {
            return Err(AddressError::UnsupportedScheme(url.scheme().to_string()));
        }
        let host = url
            .host_str()
            .ok_or_else(|| invalid("missing host".to_string()))?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        return Authority::from_str(&authority).map_err(|e| invalid(e.to_string()));
    }

    Authority::from_str(raw).map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_and_port() {
        let authority = parse_address("localhost:9000").unwrap();
        assert_eq!(authority.host(), "localhost");
        assert_eq!(authority.port_u16(), Some(9000));
    }

    #[test]
    fn bare_host_without_port() {
        let authority = parse_address("backend.internal").unwrap();
        assert_eq!(authority.as_str(), "backend.internal");
        assert_eq!(authority.port_u16(), None);
    }

    #[test]
    fn http_url_drops_path() {
        let authority = parse_address("http://127.0.0.1:3000/ignored").unwrap();
        assert_eq!(authority.as_str(), "127.0.0.1:3000");
    }

    #[test]
    fn rejects_https_and_garbage() {
        assert_eq!(
            parse_address("https://example.com"),
            Err(AddressError::UnsupportedScheme("https".into()))
        );
        assert_eq!(parse_address("  "), Err(AddressError::Empty));
        assert!(parse_address("not a host").is_err());
    }
}
