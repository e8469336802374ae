//! Route matching logic.
//!
//! # Responsibilities
//! - Match a request path against a rule's configured path
//! - Root rule (`/`) matches only the root path
//! - Other rules match on whole path segments, never on substrings
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Trailing slashes on the configured path are ignored
//! - No regex to guarantee O(n) matching

/// A compiled rule path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// Matches `/` or the empty path only.
    Root,
    /// Matches the prefix itself or anything below it (`prefix/...`).
    Prefix(String),
}

impl PathPattern {
    /// Compile a configured rule path.
    pub fn new(path: &str) -> Self {
        if path == "/" {
            Self::Root
        } else {
            Self::Prefix(path.trim_end_matches('/').to_string())
        }
    }

    /// Returns true if the request path falls under this pattern.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Root => path.is_empty() || path == "/",
            Self::Prefix(prefix) => match path.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
        }
    }
}
