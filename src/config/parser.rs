//! Configuration parser for loading configuration files.
//!
//! This module handles loading configuration from YAML files and environment
//! variables, with proper precedence and error handling.

use crate::error::{ConfigError, ProviderError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::ProviderConfig;

/// Environment variable overriding `client.endpoint`.
pub const ENV_ENDPOINT: &str = "CONVERGE_ENDPOINT";

/// Environment variable overriding `client.api_version`.
pub const ENV_API_VERSION: &str = "CONVERGE_API_VERSION";

/// Environment variable overriding `retry.max_duration_secs`.
pub const ENV_RETRY_MAX_DURATION: &str = "CONVERGE_RETRY_MAX_DURATION_SECS";

/// Environment variable overriding `retry.interval_secs`.
pub const ENV_RETRY_INTERVAL: &str = "CONVERGE_RETRY_INTERVAL_SECS";

/// Configuration parser.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ProviderConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ProviderError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ProviderConfig> {
        debug!("Parsing YAML configuration");

        if content.trim().is_empty() {
            return Ok(ProviderConfig::default());
        }

        let config: ProviderConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            ProviderError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Parsed configuration for endpoint: {}", config.client.endpoint);
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an override
    /// is not a valid number.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<ProviderConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies `CONVERGE_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric override cannot be parsed.
    pub fn apply_env_overrides<F>(config: &mut ProviderConfig, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            debug!("Overriding client.endpoint from environment");
            config.client.endpoint = endpoint;
        }

        if let Some(version) = lookup(ENV_API_VERSION) {
            debug!("Overriding client.api_version from environment");
            config.client.api_version = version;
        }

        if let Some(value) = lookup(ENV_RETRY_MAX_DURATION) {
            debug!("Overriding retry.max_duration_secs from environment");
            config.retry.max_duration_secs = parse_secs(ENV_RETRY_MAX_DURATION, &value)?;
        }

        if let Some(value) = lookup(ENV_RETRY_INTERVAL) {
            debug!("Overriding retry.interval_secs from environment");
            config.retry.interval_secs = parse_secs(ENV_RETRY_INTERVAL, &value)?;
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ProviderError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Reads the API key from the variable named by `client.api_key_env`.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is not set.
    pub fn api_key(config: &ProviderConfig) -> Result<String> {
        let name = &config.client.api_key_env;
        std::env::var(name).map_err(|_| {
            ProviderError::Config(ConfigError::MissingEnvVar { name: name.clone() })
        })
    }
}

fn parse_secs(name: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|e| {
        ProviderError::Config(ConfigError::validation(
            format!("{name} must be a whole number of seconds: {e}"),
            name,
        ))
    })
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["converge.yaml", "converge.yml", ".converge.yaml"];

/// Finds the configuration file in `start_dir`, its ancestors, or the user
/// configuration directory (`<config dir>/converge/config.yaml`).
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    if let Some(user_config) = dirs::config_dir().map(|d| d.join("converge").join("config.yaml")) {
        if user_config.exists() {
            info!("Using user configuration: {}", user_config.display());
            return Ok(user_config);
        }
    }

    Err(ProviderError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}
