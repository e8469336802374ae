//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (worker count, timeouts)
//! - Check rule paths and upstream addresses
//! - Report rules that reference unknown upstreams
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - A rule pointing at an unknown upstream id is a warning, not an error:
//!   such requests are answered with 500 at request time

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::routing::upstream::parse_address;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server.workers must be at least 1")]
    NoWorkers,

    #[error("rule #{index}: path {path:?} must start with '/'")]
    InvalidRulePath { index: usize, path: String },

    #[error("rule #{index} ({path}): at least one upstream is required")]
    EmptyRuleUpstreams { index: usize, path: String },

    #[error("upstream #{index}: id must not be empty")]
    EmptyUpstreamId { index: usize },

    #[error("duplicate upstream id {0:?}")]
    DuplicateUpstream(String),

    #[error("upstream {id:?}: {reason}")]
    InvalidUpstreamUrl { id: String, reason: String },

    #[error("timeouts.{0} must be greater than 0")]
    ZeroTimeout(&'static str),

    #[error("limits.max_body_size must be greater than 0")]
    ZeroBodyLimit,
}

/// A rule whose first upstream id is not defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub rule_path: String,
    pub upstream_id: String,
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let server = &config.server;

    if server.workers == Some(0) {
        errors.push(ValidationError::NoWorkers);
    }

    for (index, rule) in server.rules.iter().enumerate() {
        if !rule.path.starts_with('/') {
            errors.push(ValidationError::InvalidRulePath {
                index,
                path: rule.path.clone(),
            });
        }
        if rule.upstreams.is_empty() {
            errors.push(ValidationError::EmptyRuleUpstreams {
                index,
                path: rule.path.clone(),
            });
        }
    }

    let mut seen = HashSet::new();
    for (index, upstream) in server.upstreams.iter().enumerate() {
        if upstream.id.is_empty() {
            errors.push(ValidationError::EmptyUpstreamId { index });
        } else if !seen.insert(upstream.id.as_str()) {
            errors.push(ValidationError::DuplicateUpstream(upstream.id.clone()));
        }
        if let Err(e) = parse_address(&upstream.url) {
            errors.push(ValidationError::InvalidUpstreamUrl {
                id: upstream.id.clone(),
                reason: e.to_string(),
            });
        }
    }

    let timeouts = &config.timeouts;
    for (name, value) in [
        ("connect_secs", timeouts.connect_secs),
        ("upstream_secs", timeouts.upstream_secs),
        ("reply_secs", timeouts.reply_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Rules whose first upstream id has no matching upstream definition.
pub fn dangling_references(config: &ProxyConfig) -> Vec<DanglingReference> {
    let known: HashSet<&str> = config
        .server
        .upstreams
        .iter()
        .map(|u| u.id.as_str())
        .collect();

    config
        .server
        .rules
        .iter()
        .filter_map(|rule| {
            let id = rule.upstreams.first()?;
            (!known.contains(id.as_str())).then(|| DanglingReference {
                rule_path: rule.path.clone(),
                upstream_id: id.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RuleConfig, UpstreamConfig};

    fn rule(path: &str, upstreams: &[&str]) -> RuleConfig {
        RuleConfig {
            path: path.into(),
            upstreams: upstreams.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn upstream(id: &str, url: &str) -> UpstreamConfig {
        UpstreamConfig {
            id: id.into(),
            url: url.into(),
        }
    }

    #[test]
    fn accepts_minimal_config() {
        let mut config = ProxyConfig::default();
        config.server.rules.push(rule("/api", &["svc1"]));
        config.server.upstreams.push(upstream("svc1", "localhost:9000"));
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = ProxyConfig::default();
        config.server.workers = Some(0);
        config.server.rules.push(rule("api", &[]));
        config.server.upstreams.push(upstream("svc1", "localhost:9000"));
        config.server.upstreams.push(upstream("svc1", "https://secure.example"));
        config.timeouts.reply_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::NoWorkers));
        assert!(errors.contains(&ValidationError::InvalidRulePath {
            index: 0,
            path: "api".into()
        }));
        assert!(errors.contains(&ValidationError::EmptyRuleUpstreams {
            index: 0,
            path: "api".into()
        }));
        assert!(errors.contains(&ValidationError::DuplicateUpstream("svc1".into())));
        assert!(errors.contains(&ValidationError::ZeroTimeout("reply_secs")));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidUpstreamUrl { .. })));
    }

    #[test]
    fn dangling_reference_is_reported_not_rejected() {
        let mut config = ProxyConfig::default();
        config.server.rules.push(rule("/x", &["missing"]));
        config.server.rules.push(rule("/y", &["svc1", "missing"]));
        config.server.upstreams.push(upstream("svc1", "localhost:9000"));

        assert_eq!(validate_config(&config), Ok(()));
        assert_eq!(
            dangling_references(&config),
            vec![DanglingReference {
                rule_path: "/x".into(),
                upstream_id: "missing".into(),
            }]
        );
    }
}
