//! Configuration loading from disk and from a worker's environment.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable carrying a worker's configuration snapshot.
pub const WORKER_CONFIG_ENV: &str = "PROXY_WORKER_CONFIG";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unsupported config format {0} (expected .yaml, .yml or .toml)")]
    UnsupportedFormat(PathBuf),

    #[error("Parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Supported config file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Pick a format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

/// Load and validate configuration from a YAML or TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content, format)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<ProxyConfig, ConfigError> {
    let config: ProxyConfig = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        ConfigFormat::Toml => toml::from_str(content)?,
    };
    accept(config)
}

/// Serialize a validated configuration for handing to a worker.
pub fn to_snapshot(config: &ProxyConfig) -> Result<String, ConfigError> {
    Ok(serde_json::to_string(config)?)
}

/// Rebuild a configuration from a snapshot produced by [`to_snapshot`].
pub fn from_snapshot(snapshot: &str) -> Result<ProxyConfig, ConfigError> {
    let config: ProxyConfig = serde_json::from_str(snapshot)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Read the configuration snapshot a supervisor placed in our environment.
pub fn config_from_env() -> Result<ProxyConfig, ConfigError> {
    let snapshot = std::env::var(WORKER_CONFIG_ENV)
        .map_err(|_| ConfigError::MissingEnv(WORKER_CONFIG_ENV))?;
    from_snapshot(&snapshot)
}

fn accept(config: ProxyConfig) -> Result<ProxyConfig, ConfigError> {
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
