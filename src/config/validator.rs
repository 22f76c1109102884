//! Configuration validation.
//!
//! This module checks a parsed [`ProviderConfig`] for values that would make
//! the client, the retry loop or the operation awaiter misbehave.

use crate::error::{ConfigError, ProviderError, Result};
use reqwest::Url;
use serde::Serialize;
use tracing::debug;

use super::spec::{ClientConfig, OperationsConfig, ProviderConfig, RetryConfig};

/// Validator for provider configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default, Serialize)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug, Serialize)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ValidationResult {
    /// Returns true if no check failed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.into(),
        });
    }
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a provider configuration.
    ///
    /// Warnings never fail validation; they are returned for display.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any check fails.
    pub fn validate(&self, config: &ProviderConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        match result.errors.first() {
            None => {
                debug!("Configuration validation passed");
                Ok(result)
            }
            Some(first) => Err(ProviderError::Config(ConfigError::ValidationError {
                message: first.message.clone(),
                field: Some(first.field.clone()),
            })),
        }
    }

    /// Runs every check and returns all findings without failing.
    #[must_use]
    pub fn check(&self, config: &ProviderConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_client(&config.client, &mut result);
        Self::validate_retry(&config.retry, &mut result);
        Self::validate_operations(&config.operations, &config.retry, &mut result);

        result
    }

    fn validate_client(client: &ClientConfig, result: &mut ValidationResult) {
        match Url::parse(&client.endpoint) {
            Ok(url) if url.scheme() == "https" => {}
            Ok(url) if url.scheme() == "http" => {
                result
                    .warnings
                    .push(format!("client.endpoint '{}' is not using TLS", client.endpoint));
            }
            Ok(url) => result.error(
                "client.endpoint",
                format!("Unsupported endpoint scheme '{}'", url.scheme()),
            ),
            Err(e) => result.error(
                "client.endpoint",
                format!("Invalid endpoint '{}': {e}", client.endpoint),
            ),
        }

        if client.api_version.trim().is_empty() {
            result.error("client.api_version", "API version cannot be empty");
        }

        if client.request_timeout_secs == 0 {
            result.error("client.request_timeout_secs", "Request timeout must be positive");
        }

        if client.api_key_env.trim().is_empty() {
            result.error("client.api_key_env", "API key variable name cannot be empty");
        }
    }

    fn validate_retry(retry: &RetryConfig, result: &mut ValidationResult) {
        if retry.interval_secs == 0 {
            result.error("retry.interval_secs", "Retry interval must be positive");
        }

        if retry.max_duration_secs == 0 {
            result.error("retry.max_duration_secs", "Retry budget must be positive");
        } else if retry.interval_secs > retry.max_duration_secs {
            result.error(
                "retry.interval_secs",
                format!(
                    "Retry interval ({}s) exceeds the retry budget ({}s)",
                    retry.interval_secs, retry.max_duration_secs
                ),
            );
        }

        if !retry.multiplier.is_finite() || retry.multiplier < 1.0 {
            result.error(
                "retry.multiplier",
                format!("Multiplier must be at least 1.0, got {}", retry.multiplier),
            );
        }

        if retry.max_interval_secs < retry.interval_secs {
            result.warnings.push(format!(
                "retry.max_interval_secs ({}) is below retry.interval_secs ({}); every delay will be {}s",
                retry.max_interval_secs, retry.interval_secs, retry.max_interval_secs
            ));
        }
    }

    fn validate_operations(
        operations: &OperationsConfig,
        retry: &RetryConfig,
        result: &mut ValidationResult,
    ) {
        if operations.poll_interval_secs == 0 {
            result.error("operations.poll_interval_secs", "Poll interval must be positive");
        }

        match operations.default_timeout_secs {
            Some(0) => result.error(
                "operations.default_timeout_secs",
                "Default operation timeout must be positive",
            ),
            Some(timeout) if timeout < operations.poll_interval_secs => {
                result.warnings.push(format!(
                    "operations.default_timeout_secs ({timeout}) is shorter than one poll interval"
                ));
            }
            Some(_) => {}
            None => {
                if retry.max_duration_secs > 0 {
                    debug!("No default operation timeout; waits are bounded by the caller");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let result = ConfigValidator::new()
            .validate(&ProviderConfig::default())
            .unwrap();
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_invalid_endpoint() {
        let mut config = ProviderConfig::default();
        config.client.endpoint = String::from("::nope");

        let err = ConfigValidator::new().validate(&config).unwrap_err();
        match err {
            ProviderError::Config(ConfigError::ValidationError { field, .. }) => {
                assert_eq!(field.as_deref(), Some("client.endpoint"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_plain_http_is_a_warning() {
        let mut config = ProviderConfig::default();
        config.client.endpoint = String::from("http://localhost:8080");

        let result = ConfigValidator::new().validate(&config).unwrap();
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_retry_checks_collect_all_errors() {
        let mut config = ProviderConfig::default();
        config.retry.interval_secs = 600;
        config.retry.multiplier = 0.5;
        config.operations.poll_interval_secs = 0;

        let result = ConfigValidator::new().check(&config);
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();

        assert_eq!(
            fields,
            vec![
                "retry.interval_secs",
                "retry.multiplier",
                "operations.poll_interval_secs"
            ]
        );
    }

    #[test]
    fn test_short_default_timeout_warns() {
        let mut config = ProviderConfig::default();
        config.operations.poll_interval_secs = 10;
        config.operations.default_timeout_secs = Some(5);

        let result = ConfigValidator::new().check(&config);
        assert!(result.errors.is_empty());
        assert_eq!(result.warnings.len(), 1);
    }
}
