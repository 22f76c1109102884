//! Control-plane API types and data structures.
//!
//! This module defines the operation record returned by mutating calls, the
//! decoded outcome taxonomy, and the per-call options understood by the
//! retrying invoker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A long-running operation as reported by the control plane.
///
/// Only `id` identifies the operation; every other field is a snapshot taken
/// by the most recent status query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncOperation {
    /// Server-assigned operation identifier.
    pub id: String,
    /// Raw remote state string.
    #[serde(default)]
    pub state: String,
    /// Failure reason, set when the state is failed.
    #[serde(default)]
    pub failure_reason: String,
    /// Kind of operation (e.g. `create-namespace`).
    #[serde(default)]
    pub operation_type: Option<String>,
    /// When the operation started.
    #[serde(default)]
    pub started_time: Option<DateTime<Utc>>,
    /// When the operation finished.
    #[serde(default)]
    pub finished_time: Option<DateTime<Utc>>,
}

impl AsyncOperation {
    /// Creates a handle for an operation known only by id.
    #[must_use]
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Decodes the current state into an outcome.
    #[must_use]
    pub fn outcome(&self) -> OperationOutcome {
        OperationOutcome::decode(&self.state, &self.failure_reason)
    }
}

/// Decoded state of a long-running operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// Accepted but not started.
    Pending,
    /// Running.
    InProgress,
    /// Completed successfully.
    Fulfilled,
    /// Completed with a failure.
    Failed(String),
    /// Cancelled on the remote side.
    Cancelled,
    /// A state this client does not know about.
    Unknown(String),
}

impl OperationOutcome {
    /// Decodes a remote state string.
    ///
    /// Matching is case-insensitive and accepts both `in_progress` and the
    /// enum-prefixed `STATE_IN_PROGRESS` spelling.
    #[must_use]
    pub fn decode(state: &str, failure_reason: &str) -> Self {
        let normalized = state.trim().to_ascii_lowercase();
        let bare = normalized.strip_prefix("state_").unwrap_or(&normalized);

        match bare {
            "pending" => Self::Pending,
            "in_progress" | "inprogress" => Self::InProgress,
            "fulfilled" => Self::Fulfilled,
            "failed" => Self::Failed(failure_reason.to_string()),
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Unknown(state.to_string()),
        }
    }

    /// Returns true once no further polling is meaningful.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Fulfilled | Self::Failed(_) | Self::Cancelled)
    }
}

impl fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in progress"),
            Self::Fulfilled => write!(f, "fulfilled"),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Unknown(raw) => write!(f, "unknown state '{raw}'"),
        }
    }
}

/// Per-call options.
///
/// Unset retry fields fall back to the invoker's configured policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Idempotency key sent with every attempt of one invocation.
    pub request_id: Option<String>,
    /// Overrides the retry budget.
    pub max_duration: Option<Duration>,
    /// Overrides the base backoff interval.
    pub interval: Option<Duration>,
}

impl CallOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Overrides the retry budget.
    #[must_use]
    pub const fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    /// Overrides the backoff interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_states() {
        assert_eq!(OperationOutcome::decode("pending", ""), OperationOutcome::Pending);
        assert_eq!(
            OperationOutcome::decode("STATE_IN_PROGRESS", ""),
            OperationOutcome::InProgress
        );
        assert_eq!(
            OperationOutcome::decode("Fulfilled", ""),
            OperationOutcome::Fulfilled
        );
        assert_eq!(
            OperationOutcome::decode("failed", "quota exceeded"),
            OperationOutcome::Failed(String::from("quota exceeded"))
        );
        assert_eq!(
            OperationOutcome::decode("STATE_CANCELLED", ""),
            OperationOutcome::Cancelled
        );
    }

    #[test]
    fn test_decode_unknown_keeps_raw_state() {
        let outcome = OperationOutcome::decode("STATE_REJECTED", "");
        assert_eq!(outcome, OperationOutcome::Unknown(String::from("STATE_REJECTED")));
        assert!(!outcome.is_terminal());
    }

    #[test]
    fn test_operation_deserializes_from_camel_case() {
        let json = r#"{
            "id": "op-123",
            "state": "fulfilled",
            "failureReason": "",
            "operationType": "update-namespace",
            "startedTime": "2026-01-02T03:04:05Z"
        }"#;

        let op: AsyncOperation = serde_json::from_str(json).unwrap();
        assert_eq!(op.id, "op-123");
        assert_eq!(op.outcome(), OperationOutcome::Fulfilled);
        assert_eq!(op.operation_type.as_deref(), Some("update-namespace"));
        assert!(op.started_time.is_some());
        assert!(op.finished_time.is_none());
    }
}
