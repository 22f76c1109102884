// ============================================================================
// Linting
// ============================================================================

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(dead_code)]
#![deny(non_camel_case_types)]
#![warn(unused_imports)]
#![warn(unused_variables)]
#![deny(unused_must_use)]
#![deny(non_snake_case)]
#![deny(non_upper_case_globals)]
#![deny(nonstandard_style)]

// Clippy lints (warnings only)
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![warn(clippy::print_stdout)]
#![warn(clippy::todo)]
#![warn(clippy::unimplemented)]
#![warn(clippy::unwrap_in_result)]
#![warn(clippy::redundant_clone)]
#![warn(clippy::cognitive_complexity)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Converge Provider
//!
//! Convergence core for declarative providers that manage resources through
//! an asynchronous cloud control plane.
//!
//! ## Overview
//!
//! Mutating control-plane calls return a long-running operation instead of a
//! result. This crate provides the pieces a provider needs around that:
//!
//! - Retrying unary calls with exponential backoff and a stable request id
//! - Polling an operation to a terminal state under a cancellable context
//! - Comparing stored and declared attributes with semantic equality
//!   (certificate bundles, unordered string lists, zero-valued objects)
//! - Planning, applying and verifying one resource change end to end
//!
//! ## Modules
//!
//! - [`controlplane`]: Client, retrying invoker, backoff and operation awaiter
//! - [`values`]: Attribute values, semantic equality and validators
//! - [`planner`]: Diff computation between resource states
//! - [`reconciler`]: Mutate, wait and verify one resource
//! - [`config`]: Configuration parsing and validation
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! client:
//!   endpoint: https://api.converge.cloud
//!   api_version: "2024-10-01"
//! retry:
//!   max_duration_secs: 120
//!   interval_secs: 2
//! operations:
//!   poll_interval_secs: 1
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod controlplane;
pub mod error;
pub mod planner;
pub mod reconciler;
pub mod values;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, ProviderConfig};
pub use controlplane::{
    AsyncOperation, BackoffPolicy, CallContext, CallOptions, ControlPlaneClient,
    OperationAwaiter, OperationStatusApi, RetryingInvoker, RpcStatus, StatusCode,
};
pub use error::{ProviderError, Result};
pub use planner::{DiffEngine, DiffType, ResourceDiff};
pub use reconciler::{ConvergenceOutcome, ConvergenceReport, Converger, ResourceHandler};
pub use values::{
    CertificateBundle, CustomKind, CustomValue, Diagnostics, GenericValue, ResourceState,
    SemanticValue, UnorderedStringList, ZeroObject,
};
