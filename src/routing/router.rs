//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled rules in declared order
//! - Resolve a request path to the upstream of the first matching rule
//! - Distinguish "no rule" from "rule points at an unknown upstream"
//!
//! # Design Decisions
//! - Immutable after construction (no locking)
//! - O(1) upstream lookup via HashMap
//! - O(n) rule scan (acceptable for typical rule counts)
//! - Only the first upstream of a rule is consulted

use std::collections::HashMap;

use crate::config::ServerConfig;
use crate::error::ProxyError;
use crate::routing::matcher::PathPattern;
use crate::routing::upstream::Upstream;

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub path: String,
    pub pattern: PathPattern,
    pub upstreams: Vec<String>,
}

/// Immutable routing table owned by a worker.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    rules: Vec<Rule>,
    upstreams: HashMap<String, Upstream>,
}

impl RoutingTable {
    /// Compile the routing table from configuration.
    ///
    /// Upstreams with unusable addresses are left out, so rules that point
    /// at them resolve to `UpstreamNotFound`.
    pub fn from_config(server: &ServerConfig) -> Self {
        let rules = server
            .rules
            .iter()
            .map(|rule| {
                if rule.upstreams.len() > 1 {
                    tracing::warn!(
                        path = %rule.path,
                        upstreams = ?rule.upstreams,
                        "Rule lists several upstreams; only the first is used"
                    );
                }
                Rule {
                    path: rule.path.clone(),
                    pattern: PathPattern::new(&rule.path),
                    upstreams: rule.upstreams.clone(),
                }
            })
            .collect();

        let mut upstreams = HashMap::new();
        for config in &server.upstreams {
            match Upstream::from_config(config) {
                Ok(upstream) => {
                    upstreams.insert(upstream.id.clone(), upstream);
                }
                Err(e) => {
                    tracing::warn!(
                        id = %config.id,
                        url = %config.url,
                        error = %e,
                        "Skipping upstream"
                    );
                }
            }
        }

        Self { rules, upstreams }
    }

    /// Resolve a request URL (path plus optional query) to its upstream.
    pub fn resolve(&self, url: &str) -> Result<&Upstream, ProxyError> {
        let path = url.split('?').next().unwrap_or_default();

        let rule = self
            .rules
            .iter()
            .find(|rule| rule.pattern.matches(path))
            .ok_or_else(|| ProxyError::RouteNotFound(url.to_string()))?;
        tracing::trace!(rule = %rule.path, url, "Rule matched");

        rule.upstreams
            .first()
            .and_then(|id| self.upstreams.get(id))
            .ok_or_else(|| ProxyError::UpstreamNotFound(url.to_string()))
    }
}
