//! Configuration for building ranged resources

use crate::error::{RangeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Configuration for resource building and the HTTP client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangerConfig {
    /// Whole-request timeout in seconds (default: 30)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Connect timeout in seconds (default: 10)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Allow pinning a resource by Last-Modified when it has no strong
    /// ETag (default: false)
    #[serde(default)]
    pub validate_last_modified: bool,

    /// User-Agent sent with every request (optional)
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for RangerConfig {
    fn default() -> Self {
        RangerConfig {
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            validate_last_modified: false,
            user_agent: None,
            headers: BTreeMap::new(),
        }
    }
}

impl RangerConfig {
    /// Load configuration from a YAML file
    ///
    /// # Arguments
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Returns
    /// * `Ok(RangerConfig)` if the file parses and validates
    /// * `Err(RangeError)` if reading, parsing or validation fails
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            RangeError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: RangerConfig = serde_yaml::from_str(content)
            .map_err(|e| RangeError::ConfigError(format!("Failed to parse YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Validation Rules
    /// - both timeouts must be greater than zero
    /// - header names must not be empty and must not be `Range`,
    ///   `If-Match` or `If-Unmodified-Since`, which the reader owns
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(RangeError::ConfigError(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.connect_timeout_secs == 0 {
            return Err(RangeError::ConfigError(
                "connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        for name in self.headers.keys() {
            if name.trim().is_empty() {
                return Err(RangeError::ConfigError(
                    "header names must not be empty".to_string(),
                ));
            }
            if ["range", "if-match", "if-unmodified-since"]
                .iter()
                .any(|owned| name.eq_ignore_ascii_case(owned))
            {
                return Err(RangeError::ConfigError(format!(
                    "header {} is set per request and cannot be configured",
                    name
                )));
            }
        }

        Ok(())
    }
}
