//! Control-plane integration module.
//!
//! This module provides everything needed to drive asynchronous control-plane
//! operations to completion: status codes, call context, backoff, the retrying
//! invoker, the operation awaiter and an HTTP client.

mod awaiter;
mod backoff;
mod client;
mod context;
mod retry;
mod status;
mod types;

pub use awaiter::{OperationAwaiter, OperationStatusApi, DEFAULT_POLL_INTERVAL};
pub use backoff::{
    BackoffPolicy, DEFAULT_INTERVAL, DEFAULT_MAX_DURATION, DEFAULT_MAX_INTERVAL,
    DEFAULT_MULTIPLIER,
};
pub use client::{ControlPlaneClient, API_VERSION_HEADER, REQUEST_ID_HEADER};
pub use context::{CallContext, CancelCause};
pub use retry::RetryingInvoker;
pub use status::{RpcStatus, StatusCode};
pub use types::{AsyncOperation, CallOptions, OperationOutcome};

#[cfg(test)]
pub use awaiter::MockOperationStatusApi;
