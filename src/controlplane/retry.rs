//! Retrying invoker for unary control-plane calls.
//!
//! A call is issued once; failures with a transient status code are retried
//! with exponential backoff until the wall-clock budget is spent. Any other
//! status code ends the invocation on the spot.

use std::future::Future;

use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::TransportError;

use super::backoff::BackoffPolicy;
use super::context::CallContext;
use super::status::RpcStatus;
use super::types::CallOptions;

/// Wraps unary calls with classification and backoff.
#[derive(Debug, Clone, Default)]
pub struct RetryingInvoker {
    /// Policy applied when a call does not override it.
    policy: BackoffPolicy,
}

impl RetryingInvoker {
    /// Creates an invoker with the given backoff policy.
    #[must_use]
    pub const fn new(policy: BackoffPolicy) -> Self {
        Self { policy }
    }

    /// Returns the default policy of this invoker.
    #[must_use]
    pub const fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Invokes `call` with `request`, retrying transient failures.
    ///
    /// Every attempt receives the same request and the same request id. The
    /// in-flight call and each backoff sleep race `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Terminal`] for non-retryable codes,
    /// [`TransportError::Transient`] once the retry budget is exhausted, and
    /// [`TransportError::Cancelled`] if `ctx` ends first.
    pub async fn invoke<'a, Req, Resp, F, Fut>(
        &self,
        ctx: &CallContext,
        request: &'a Req,
        options: CallOptions,
        mut call: F,
    ) -> Result<Resp, TransportError>
    where
        Req: ?Sized,
        F: FnMut(&'a Req, CallOptions) -> Fut,
        Fut: Future<Output = Result<Resp, RpcStatus>>,
    {
        let policy = self
            .policy
            .with_overrides(options.max_duration, options.interval);
        let options = CallOptions {
            request_id: Some(
                options
                    .request_id
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
            ),
            ..options
        };

        let started = Instant::now();
        let mut attempts: u32 = 0;
        let mut last: Option<RpcStatus> = None;

        loop {
            attempts = attempts.saturating_add(1);

            let result = tokio::select! {
                biased;
                cause = ctx.done() => {
                    return Err(TransportError::Cancelled { cause, last });
                }
                result = call(request, options.clone()) => result,
            };

            let status = match result {
                Ok(response) => {
                    if attempts > 1 {
                        debug!("Call succeeded after {attempts} attempts");
                    }
                    return Ok(response);
                }
                Err(status) => status,
            };

            if !status.is_retryable() {
                debug!(code = %status.code, "Call failed with a non-retryable status");
                return Err(TransportError::Terminal { status });
            }

            let elapsed = started.elapsed();
            let Some(delay) = policy.delay(attempts - 1, elapsed) else {
                warn!(
                    code = %status.code,
                    attempts,
                    elapsed_secs = elapsed.as_secs(),
                    "Retry budget exhausted"
                );
                return Err(TransportError::Transient {
                    status,
                    attempts,
                    elapsed,
                });
            };

            warn!(
                code = %status.code,
                attempt = attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Transient failure, retrying: {}",
                status.message
            );
            last = Some(status);

            tokio::select! {
                biased;
                cause = ctx.done() => {
                    return Err(TransportError::Cancelled { cause, last });
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}
