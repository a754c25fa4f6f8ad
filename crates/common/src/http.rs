//! Tower middleware for the HTTP surface: access logging and request tracing.

mod logging;
mod otel_tracing;

pub use logging::*;
pub use otel_tracing::*;

/// Header carrying the per-request correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Path prefixes excluded from logging and tracing, e.g. probes
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IgnoredPaths(Vec<String>);

impl IgnoredPaths {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self(prefixes)
    }

    /// Parse comma-separated prefixes, dropping blanks
    pub fn from_comma_separated(prefixes: &str) -> Self {
        Self(
            prefixes
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    pub fn matches(&self, path: &str) -> bool {
        self.0.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}
