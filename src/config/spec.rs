//! Configuration specification types for the convergence core.
//!
//! This module defines the structs that map to `converge.yaml`. Every field
//! has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default control-plane endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.converge.cloud";

/// Default API version sent with every request.
pub const DEFAULT_API_VERSION: &str = "2024-10-01";

/// Default environment variable holding the API key.
pub const DEFAULT_API_KEY_ENV: &str = "CONVERGE_API_KEY";

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Control-plane client settings.
    #[serde(default)]
    pub client: ClientConfig,
    /// Retry settings for unary calls.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Long-running operation settings.
    #[serde(default)]
    pub operations: OperationsConfig,
}

/// Control-plane client settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the API.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Timeout for a single HTTP request, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

/// Retry settings for unary calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Total time budget for retrying one call, in seconds.
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u64,
    /// Delay after the first failure, in seconds.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Growth factor between consecutive delays.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Cap on a single delay, in seconds.
    #[serde(default = "default_max_interval_secs")]
    pub max_interval_secs: u64,
}

/// Long-running operation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationsConfig {
    /// Interval between status queries, in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Deadline applied when the caller supplies none, in seconds.
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_version: default_api_version(),
            request_timeout_secs: default_request_timeout_secs(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: default_max_duration_secs(),
            interval_secs: default_interval_secs(),
            multiplier: default_multiplier(),
            max_interval_secs: default_max_interval_secs(),
        }
    }
}

impl Default for OperationsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            default_timeout_secs: None,
        }
    }
}

impl OperationsConfig {
    /// Returns the poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Returns the default operation deadline, if any.
    #[must_use]
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_secs.map(Duration::from_secs)
    }
}

fn default_endpoint() -> String {
    String::from(DEFAULT_ENDPOINT)
}

fn default_api_version() -> String {
    String::from(DEFAULT_API_VERSION)
}

const fn default_request_timeout_secs() -> u64 {
    30
}

fn default_api_key_env() -> String {
    String::from(DEFAULT_API_KEY_ENV)
}

const fn default_max_duration_secs() -> u64 {
    300
}

const fn default_interval_secs() -> u64 {
    5
}

const fn default_multiplier() -> f64 {
    2.0
}

const fn default_max_interval_secs() -> u64 {
    60
}

const fn default_poll_interval_secs() -> u64 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: ProviderConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, ProviderConfig::default());
        assert_eq!(config.retry.max_duration_secs, 300);
        assert_eq!(config.retry.interval_secs, 5);
        assert_eq!(config.operations.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.operations.default_timeout(), None);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let yaml = r"
retry:
  interval_secs: 2
operations:
  default_timeout_secs: 900
";
        let config: ProviderConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.retry.interval_secs, 2);
        assert_eq!(config.retry.max_duration_secs, 300);
        assert_eq!(config.client.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(
            config.operations.default_timeout(),
            Some(Duration::from_secs(900))
        );
    }
}
