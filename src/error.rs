//! Error types for the convergence core.
//!
//! This module provides the error hierarchy for every stage of a
//! convergence: configuration, transport retries, long-running operation
//! polling, certificate normalization and semantic value handling.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::controlplane::{CancelCause, RpcStatus, StatusCode};

/// The main error type for the convergence core.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transport errors from a (possibly retried) unary call.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Long-running operation errors.
    #[error("Operation error: {0}")]
    Operation(#[from] OperationError),

    /// Certificate bundle normalization errors.
    #[error("Certificate error: {0}")]
    Certificate(#[from] CertificateError),

    /// Semantic value and attribute errors.
    #[error("Value error: {0}")]
    Value(#[from] ValueError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
}

/// Errors surfaced by the retrying invoker.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The call failed with a status code that is never retried.
    #[error("call failed: {status}")]
    Terminal {
        /// The status returned by the call.
        status: RpcStatus,
    },

    /// The call kept failing with a retryable code until the budget ran out.
    #[error("call failed after {attempts} attempts over {elapsed:?}: {status}")]
    Transient {
        /// The last status returned by the call.
        status: RpcStatus,
        /// Number of attempts made.
        attempts: u32,
        /// Time spent retrying.
        elapsed: Duration,
    },

    /// The calling context was cancelled while the call was in flight or backing off.
    #[error("call interrupted: {cause}")]
    Cancelled {
        /// Why the context ended.
        cause: CancelCause,
        /// The last status observed before the interruption, if any.
        last: Option<RpcStatus>,
    },
}

/// Errors surfaced while awaiting a long-running operation.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The operation handle was absent or empty.
    #[error("invalid operation handle: operation is missing or has no id")]
    InvalidOperationHandle,

    /// The remote side reported the operation as failed.
    #[error("operation {operation_id} failed: {reason}")]
    Failed {
        /// Operation identifier.
        operation_id: String,
        /// Failure reason supplied by the remote side.
        reason: String,
    },

    /// The remote side reported the operation as cancelled.
    #[error("operation {operation_id} was cancelled")]
    Cancelled {
        /// Operation identifier.
        operation_id: String,
    },

    /// The caller's context ended before a terminal state was observed.
    #[error("stopped waiting for operation {operation_id}: {cause}")]
    Interrupted {
        /// Operation identifier.
        operation_id: String,
        /// Why the context ended.
        cause: CancelCause,
    },

    /// Querying the operation status failed.
    #[error("failed to query status of operation {operation_id}: {status}")]
    StatusQuery {
        /// Operation identifier.
        operation_id: String,
        /// Status returned by the status query.
        status: RpcStatus,
    },
}

/// Certificate bundle normalization errors.
#[derive(Debug, Error)]
pub enum CertificateError {
    /// The bundle is not valid base64.
    #[error("failed to decode certificate bundle: {message}")]
    Decode {
        /// Decoder error description.
        message: String,
    },

    /// The bundle decoded to zero bytes.
    #[error("certificate bundle is empty")]
    EmptyInput,

    /// The decoded bundle contains bytes that are not certificate PEM blocks.
    #[error("malformed certificate bundle: {message}")]
    MalformedCertificate {
        /// Description of the malformed content.
        message: String,
    },

    /// The PEM payload is not a sequence of X.509 certificates.
    #[error("failed to parse certificates: {message}")]
    Parse {
        /// Parser error description.
        message: String,
    },
}

/// Semantic value and attribute errors.
#[derive(Debug, Error)]
pub enum ValueError {
    /// A comparison or conversion was invoked with an incompatible value.
    #[error("type mismatch: expected {expected}, found {found}")]
    SemanticEqualityTypeMismatch {
        /// The expected value kind.
        expected: String,
        /// The kind that was supplied.
        found: String,
    },

    /// A required attribute was missing or unreadable.
    #[error("attribute lookup failed for '{path}': {reason}")]
    AttributeLookup {
        /// Attribute path.
        path: String,
        /// Why the lookup failed.
        reason: String,
    },
}

/// Result type alias for convergence operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

impl ProviderError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns the status code carried by a transport or status-query failure.
    #[must_use]
    pub const fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Transport(e) => e.code(),
            Self::Operation(OperationError::StatusQuery { status, .. }) => Some(status.code),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl TransportError {
    /// Returns the last status observed by the invoker, if any.
    #[must_use]
    pub const fn status(&self) -> Option<&RpcStatus> {
        match self {
            Self::Terminal { status } | Self::Transient { status, .. } => Some(status),
            Self::Cancelled { last, .. } => last.as_ref(),
        }
    }

    /// Returns the code of the last observed status, if any.
    #[must_use]
    pub const fn code(&self) -> Option<StatusCode> {
        match self.status() {
            Some(status) => Some(status.code),
            None => None,
        }
    }
}

impl CertificateError {
    /// Creates a malformed-certificate error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedCertificate {
            message: message.into(),
        }
    }
}

impl ValueError {
    /// Creates a type mismatch error.
    #[must_use]
    pub fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::SemanticEqualityTypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Creates an attribute lookup error.
    #[must_use]
    pub fn lookup(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AttributeLookup {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
