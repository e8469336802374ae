//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (YAML/TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → serialized to JSON and handed to every worker at spawn
//!
//! Worker side:
//!     PROXY_WORKER_CONFIG env var
//!     → loader.rs (config_from_env)
//!     → validation.rs
//!     → RoutingTable (built once, never mutated)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::{
    BalanceStrategy, Isolation, LimitsConfig, LogFormat, ObservabilityConfig, ProxyConfig,
    RuleConfig, ServerConfig, TimeoutConfig, UpstreamConfig,
};
