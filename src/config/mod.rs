//! Configuration module for the convergence core.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `converge.yaml`
//! - Applying `CONVERGE_*` environment overrides
//! - Validation of configuration values

mod spec;
mod parser;
mod validator;

pub use spec::{
    ClientConfig, OperationsConfig, ProviderConfig, RetryConfig, DEFAULT_API_KEY_ENV,
    DEFAULT_API_VERSION, DEFAULT_ENDPOINT,
};
pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, ENV_API_VERSION, ENV_ENDPOINT, ENV_RETRY_INTERVAL,
    ENV_RETRY_MAX_DURATION, find_config_file,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
