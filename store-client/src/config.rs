//! Configuration loading for apistore-client.
//!
//! Configuration is loaded from a TOML file or built in code:
//!
//! ```toml
//! base_url = "https://api.example.com/v1"
//! data_path = "data"
//! ```

use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::url::UrlBuilder;

/// Dispatcher configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Prefix of every resource URL (default: empty, relative paths).
    #[serde(default)]
    pub base_url: String,
    /// Location of the resource payload inside a response envelope.
    ///
    /// Dotted path; numeric segments index arrays (`"data"`,
    /// `"result.items"`, `"pages.0"`). Unset means the whole body.
    #[serde(default)]
    pub data_path: Option<String>,
}

impl StoreConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Set the response data path.
    pub fn with_data_path(mut self, data_path: &str) -> Self {
        self.data_path = Some(data_path.to_string());
        self
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// URL builder for this base URL.
    pub fn urls(&self) -> UrlBuilder {
        UrlBuilder::new(&self.base_url)
    }

    /// Locate the resource payload inside a response body.
    ///
    /// Returns the whole body when no data path is configured, `None` when
    /// the path does not resolve.
    pub fn extract<'a>(&self, body: &'a Value) -> Option<&'a Value> {
        match &self.data_path {
            Some(path) => value_at(body, path),
            None => Some(body),
        }
    }
}

/// Follow a dotted path (`a.b.0.c`, also `a.b[0].c`) into a JSON value.
pub fn value_at<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split(['.', '[', ']'])
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Failed to parse inline configuration.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
