//! Awaiting long-running control-plane operations.
//!
//! The awaiter polls an operation's status on a fixed tick until the remote
//! side reports a terminal state or the caller's context ends.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::error::{OperationError, TransportError};

use super::context::CallContext;
use super::retry::RetryingInvoker;
use super::status::RpcStatus;
use super::types::{AsyncOperation, CallOptions, OperationOutcome};

/// Default interval between status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Status query surface used by the awaiter.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OperationStatusApi: Send + Sync {
    /// Fetches the current record of an operation.
    async fn get_operation(
        &self,
        ctx: &CallContext,
        operation_id: &str,
    ) -> Result<AsyncOperation, RpcStatus>;
}

/// Polls an operation until it reaches a terminal state.
#[derive(Debug)]
pub struct OperationAwaiter<'a, A: ?Sized> {
    /// Status query surface.
    api: &'a A,
    /// Interval between status queries.
    tick: Duration,
    /// Optional retry wrapper around each status query.
    invoker: Option<RetryingInvoker>,
}

impl<'a, A: OperationStatusApi + ?Sized> OperationAwaiter<'a, A> {
    /// Creates an awaiter polling every second.
    #[must_use]
    pub const fn new(api: &'a A) -> Self {
        Self {
            api,
            tick: DEFAULT_POLL_INTERVAL,
            invoker: None,
        }
    }

    /// Sets the poll interval.
    #[must_use]
    pub const fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Retries each status query through `invoker` instead of failing on the
    /// first transport error.
    #[must_use]
    pub fn with_retry(mut self, invoker: RetryingInvoker) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Waits for `operation` to finish.
    ///
    /// The first status query is issued immediately, then once per tick.
    /// Unknown states keep the loop going, so an operation in a state this
    /// client does not recognise is bounded only by `ctx`.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is missing, the operation fails or is
    /// cancelled remotely, a status query fails, or `ctx` ends first.
    pub async fn wait(
        &self,
        ctx: &CallContext,
        operation: Option<&AsyncOperation>,
    ) -> Result<AsyncOperation, OperationError> {
        let operation_id = match operation {
            Some(op) if !op.id.is_empty() => op.id.as_str(),
            _ => return Err(OperationError::InvalidOperationHandle),
        };

        info!("Waiting for operation {operation_id}");

        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls: u32 = 0;

        loop {
            tokio::select! {
                biased;
                cause = ctx.done() => {
                    return Err(OperationError::Interrupted {
                        operation_id: operation_id.to_string(),
                        cause,
                    });
                }
                _ = ticker.tick() => {}
            }

            polls = polls.saturating_add(1);
            let current = self.query(ctx, operation_id).await?;

            match current.outcome() {
                OperationOutcome::Fulfilled => {
                    info!("Operation {operation_id} fulfilled after {polls} polls");
                    return Ok(current);
                }
                OperationOutcome::Failed(reason) => {
                    return Err(OperationError::Failed {
                        operation_id: operation_id.to_string(),
                        reason,
                    });
                }
                OperationOutcome::Cancelled => {
                    return Err(OperationError::Cancelled {
                        operation_id: operation_id.to_string(),
                    });
                }
                OperationOutcome::Unknown(raw) => {
                    warn!("Operation {operation_id} reported unrecognised state '{raw}', still waiting");
                }
                outcome @ (OperationOutcome::Pending | OperationOutcome::InProgress) => {
                    debug!("Operation {operation_id} is {outcome} (poll {polls})");
                }
            }
        }
    }

    /// Issues one status query, racing `ctx`.
    async fn query(
        &self,
        ctx: &CallContext,
        operation_id: &str,
    ) -> Result<AsyncOperation, OperationError> {
        let api = self.api;
        let result = match &self.invoker {
            Some(invoker) => {
                invoker
                    .invoke(ctx, operation_id, CallOptions::new(), |id, _opts| {
                        api.get_operation(ctx, id)
                    })
                    .await
            }
            None => {
                tokio::select! {
                    biased;
                    cause = ctx.done() => Err(TransportError::Cancelled { cause, last: None }),
                    result = api.get_operation(ctx, operation_id) => {
                        result.map_err(|status| TransportError::Terminal { status })
                    }
                }
            }
        };

        result.map_err(|err| match err {
            TransportError::Cancelled { cause, .. } => OperationError::Interrupted {
                operation_id: operation_id.to_string(),
                cause,
            },
            TransportError::Terminal { status } | TransportError::Transient { status, .. } => {
                OperationError::StatusQuery {
                    operation_id: operation_id.to_string(),
                    status,
                }
            }
        })
    }
}
