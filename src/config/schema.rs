//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits so the same structure can be read from a
//! config file and handed to workers as JSON.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy cluster.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener, worker pool, rules and upstreams.
    pub server: ServerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// The `server` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Front-end listen port, bound on all interfaces.
    pub listen: u16,

    /// Number of workers. Defaults to the number of available cores.
    pub workers: Option<usize>,

    /// How the front end picks a worker for each request.
    pub balance: BalanceStrategy,

    /// Whether workers run as child processes or as in-process tasks.
    pub isolation: Isolation,

    /// Ordered routing rules; first match wins.
    pub rules: Vec<RuleConfig>,

    /// Upstream definitions referenced by rules.
    pub upstreams: Vec<UpstreamConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: 8000,
            workers: None,
            balance: BalanceStrategy::default(),
            isolation: Isolation::default(),
            rules: Vec::new(),
            upstreams: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Effective worker count: configured value or the host's core count.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }
}

/// A path rule mapped to upstream ids.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RuleConfig {
    /// Path prefix. `/` only matches the root path.
    pub path: String,

    /// Upstream ids. Only the first one is used.
    pub upstreams: Vec<String>,
}

/// A named backend host.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Unique upstream identifier.
    pub id: String,

    /// Backend address, `host[:port]` or `http://host[:port]`.
    pub url: String,
}

/// Worker selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStrategy {
    #[default]
    Random,
    RoundRobin,
    LeastInFlight,
}

/// Worker isolation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Isolation {
    /// One child OS process per worker.
    #[default]
    Process,
    /// One tokio task per worker inside the front-end process.
    Task,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for the upstream to produce a full response, in seconds.
    pub upstream_secs: u64,

    /// How long the front end waits for a worker's reply, in seconds.
    pub reply_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
            reply_secs: 60,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum inbound body size in bytes.
    pub max_body_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint on the front end.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
