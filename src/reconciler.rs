//! Convergence driver.
//!
//! This module wires the pieces together for one resource: plan the change,
//! issue the mutation through the retrying invoker, wait for the resulting
//! operation, re-read the remote state and check that it now matches the
//! declaration.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::controlplane::{
    AsyncOperation, BackoffPolicy, CallContext, CallOptions, DEFAULT_POLL_INTERVAL,
    OperationAwaiter, OperationStatusApi, RetryingInvoker, RpcStatus,
};
use crate::error::Result;
use crate::planner::{DiffDetail, DiffEngine, DiffType, ResourceDiff};
use crate::values::{Diagnostics, ResourceState};

/// The CRUD surface of one resource kind.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Payload of the mutating call.
    type Request: Send + Sync;

    /// Resource name used in logs and reports.
    fn name(&self) -> &str;

    /// Issues the mutating call and returns the operation it started.
    async fn mutate(
        &self,
        ctx: &CallContext,
        request: &Self::Request,
        options: CallOptions,
    ) -> std::result::Result<AsyncOperation, RpcStatus>;

    /// Reads the current remote state; `None` if the resource does not exist.
    async fn read(&self, ctx: &CallContext)
    -> std::result::Result<Option<ResourceState>, RpcStatus>;
}

/// Drives resources to their declared state.
#[derive(Debug)]
pub struct Converger<'a, A: ?Sized> {
    /// Status query surface for the awaiter.
    status_api: &'a A,
    /// Retry wrapper for mutations and reads.
    invoker: RetryingInvoker,
    /// Poll interval of the awaiter.
    tick: Duration,
    /// Deadline applied to each operation wait.
    wait_timeout: Option<Duration>,
    /// Diff engine.
    diff_engine: DiffEngine,
}

/// How a convergence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceOutcome {
    /// Nothing to do; no remote call was made.
    Unchanged,
    /// The mutation completed and the remote state matches.
    Converged,
    /// The mutation completed but differences remain.
    Residual,
}

/// Result of a convergence run.
#[derive(Debug, Clone, Serialize)]
pub struct ConvergenceReport {
    /// Resource name.
    pub resource: String,
    /// How the run ended.
    pub outcome: ConvergenceOutcome,
    /// The planned change.
    pub plan: ResourceDiff,
    /// The completed operation, if a mutation was issued.
    pub operation: Option<AsyncOperation>,
    /// Differences between the declaration and the re-read state.
    pub residual: Vec<DiffDetail>,
    /// Diagnostics raised while planning and verifying.
    pub diagnostics: Diagnostics,
}

impl<'a, A: OperationStatusApi + ?Sized> Converger<'a, A> {
    /// Creates a converger with default retry and poll settings.
    #[must_use]
    pub fn new(status_api: &'a A) -> Self {
        Self {
            status_api,
            invoker: RetryingInvoker::default(),
            tick: DEFAULT_POLL_INTERVAL,
            wait_timeout: None,
            diff_engine: DiffEngine::new(),
        }
    }

    /// Creates a converger from configuration.
    #[must_use]
    pub fn from_config(status_api: &'a A, config: &ProviderConfig) -> Self {
        Self {
            status_api,
            invoker: RetryingInvoker::new(BackoffPolicy::from(&config.retry)),
            tick: config.operations.poll_interval(),
            wait_timeout: config.operations.default_timeout(),
            diff_engine: DiffEngine::new(),
        }
    }

    /// Sets the retry wrapper.
    #[must_use]
    pub fn with_invoker(mut self, invoker: RetryingInvoker) -> Self {
        self.invoker = invoker;
        self
    }

    /// Sets the awaiter poll interval.
    #[must_use]
    pub const fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Bounds every operation wait by `timeout`, in addition to the caller's
    /// context.
    #[must_use]
    pub const fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    /// Converges one resource from `prior` to `desired`.
    ///
    /// A plan without changes returns [`ConvergenceOutcome::Unchanged`]
    /// without calling the handler.
    ///
    /// # Errors
    ///
    /// Returns an error if the mutation or the re-read fails, or the
    /// operation fails, is cancelled, or outlives `ctx`.
    pub async fn converge<H: ResourceHandler>(
        &self,
        ctx: &CallContext,
        handler: &H,
        request: &H::Request,
        prior: Option<&ResourceState>,
        desired: Option<&ResourceState>,
    ) -> Result<ConvergenceReport> {
        let name = handler.name();
        let plan = self.diff_engine.plan(name, prior, desired);
        let mut diagnostics = plan.diagnostics.clone();

        if plan.diff_type == DiffType::NoChange {
            info!("Resource {name} is converged, nothing to do");
            return Ok(ConvergenceReport {
                resource: name.to_string(),
                outcome: ConvergenceOutcome::Unchanged,
                plan,
                operation: None,
                residual: Vec::new(),
                diagnostics,
            });
        }

        info!("Converging {plan}");

        let started = self
            .invoker
            .invoke(ctx, request, CallOptions::new(), |req, opts| {
                handler.mutate(ctx, req, opts)
            })
            .await?;
        debug!("Resource {name} mutation started operation {}", started.id);

        let awaiter = OperationAwaiter::new(self.status_api).with_tick(self.tick);
        let completed = match self.wait_timeout {
            Some(timeout) => awaiter.wait(&ctx.timeout(timeout), Some(&started)).await?,
            None => awaiter.wait(ctx, Some(&started)).await?,
        };

        let observed = self.read(ctx, handler).await?;
        let check = self.diff_engine.plan(name, observed.as_ref(), desired);
        let mut check_diags = check.diagnostics;
        diagnostics.append(&mut check_diags);

        let outcome = if check.diff_type == DiffType::NoChange {
            info!("Resource {name} converged");
            ConvergenceOutcome::Converged
        } else {
            warn!(
                "Resource {name} still differs after operation {}: {} fields",
                completed.id,
                check.details.len()
            );
            ConvergenceOutcome::Residual
        };

        Ok(ConvergenceReport {
            resource: name.to_string(),
            outcome,
            plan,
            operation: Some(completed),
            residual: check.details,
            diagnostics,
        })
    }

    /// Reads the remote state and compares it with `prior` without changing
    /// anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub async fn check_drift<H: ResourceHandler>(
        &self,
        ctx: &CallContext,
        handler: &H,
        prior: &ResourceState,
    ) -> Result<ResourceDiff> {
        let observed = self.read(ctx, handler).await?;
        let diff = self.diff_engine.drift(handler.name(), prior, observed.as_ref());

        if diff.diff_type == DiffType::Drift {
            warn!("Drift detected: {diff}");
        }

        Ok(diff)
    }

    async fn read<H: ResourceHandler>(
        &self,
        ctx: &CallContext,
        handler: &H,
    ) -> Result<Option<ResourceState>> {
        Ok(self
            .invoker
            .invoke(ctx, &(), CallOptions::new(), |_, _| handler.read(ctx))
            .await?)
    }
}

impl ConvergenceReport {
    /// Returns true unless differences remain.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.outcome != ConvergenceOutcome::Residual
    }
}

impl std::fmt::Display for ConvergenceReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self.outcome {
            ConvergenceOutcome::Unchanged => "unchanged",
            ConvergenceOutcome::Converged => "converged",
            ConvergenceOutcome::Residual => "not converged",
        };
        writeln!(f, "{} {status} ({}):", self.resource, self.plan.diff_type)?;

        if let Some(op) = &self.operation {
            writeln!(f, "  Operation: {}", op.id)?;
        }
        if !self.residual.is_empty() {
            writeln!(f, "  Remaining differences:")?;
            for detail in &self.residual {
                writeln!(f, "    - {}", detail.field)?;
            }
        }
        for diagnostic in &self.diagnostics {
            writeln!(f, "  {diagnostic}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::{MockOperationStatusApi, StatusCode};
    use crate::error::{OperationError, ProviderError, TransportError};
    use crate::values::CustomKind;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Handler backed by a scripted remote.
    struct FakeNamespace {
        mutations: AtomicU32,
        reads: AtomicU32,
        mutate_failures: AtomicU32,
        request_ids: Mutex<Vec<String>>,
        remote: Option<ResourceState>,
    }

    impl FakeNamespace {
        fn new(remote: Option<ResourceState>) -> Self {
            Self {
                mutations: AtomicU32::new(0),
                reads: AtomicU32::new(0),
                mutate_failures: AtomicU32::new(0),
                request_ids: Mutex::new(Vec::new()),
                remote,
            }
        }

        fn failing_first(self, failures: u32) -> Self {
            self.mutate_failures.store(failures, Ordering::SeqCst);
            self
        }
    }

    #[async_trait]
    impl ResourceHandler for FakeNamespace {
        type Request = serde_json::Value;

        fn name(&self) -> &str {
            "ns-1"
        }

        async fn mutate(
            &self,
            _ctx: &CallContext,
            _request: &serde_json::Value,
            options: CallOptions,
        ) -> std::result::Result<AsyncOperation, RpcStatus> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut ids) = self.request_ids.lock() {
                ids.extend(options.request_id);
            }
            let remaining = self.mutate_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.mutate_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(RpcStatus::unavailable("leader election"));
            }
            Ok(AsyncOperation::from_id("op-1"))
        }

        async fn read(
            &self,
            _ctx: &CallContext,
        ) -> std::result::Result<Option<ResourceState>, RpcStatus> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.remote.clone())
        }
    }

    fn status_api(states: &'static [&'static str]) -> MockOperationStatusApi {
        let polls = AtomicU32::new(0);
        let mut api = MockOperationStatusApi::new();
        api.expect_get_operation().returning(move |_, id| {
            let n = polls.fetch_add(1, Ordering::SeqCst) as usize;
            let state = states.get(n).copied().unwrap_or("fulfilled");
            Ok(AsyncOperation {
                id: id.to_string(),
                state: state.to_string(),
                failure_reason: String::from("namespace quota exceeded"),
                ..AsyncOperation::default()
            })
        });
        api
    }

    fn typed(value: serde_json::Value) -> ResourceState {
        let mut doc = ResourceState::from_json(value).unwrap();
        doc.wrap("roles", CustomKind::UnorderedList).unwrap();
        doc
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_change_issues_no_mutation() {
        let api = MockOperationStatusApi::new();
        let handler = FakeNamespace::new(None);
        let prior = typed(json!({"name": "ns-1", "roles": ["a", "b"]}));
        let desired = typed(json!({"name": "ns-1", "roles": ["b", "a"]}));

        let report = Converger::new(&api)
            .converge(&CallContext::new(), &handler, &json!({}), Some(&prior), Some(&desired))
            .await
            .unwrap();

        assert_eq!(report.outcome, ConvergenceOutcome::Unchanged);
        assert_eq!(handler.mutations.load(Ordering::SeqCst), 0);
        assert_eq!(handler.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_converges() {
        let api = status_api(&["pending", "in_progress"]);
        let desired = typed(json!({"name": "ns-1", "retention": 30, "roles": ["a", "b"]}));
        let remote = typed(json!({"name": "ns-1", "retention": 30, "roles": ["b", "a"]}));
        let handler = FakeNamespace::new(Some(remote));
        let prior = typed(json!({"name": "ns-1", "retention": 7, "roles": ["a", "b"]}));

        let report = Converger::new(&api)
            .converge(
                &CallContext::new(),
                &handler,
                &json!({"retention": 30}),
                Some(&prior),
                Some(&desired),
            )
            .await
            .unwrap();

        assert_eq!(report.plan.diff_type, DiffType::Update);
        assert_eq!(report.outcome, ConvergenceOutcome::Converged);
        assert!(report.is_converged());
        assert_eq!(report.operation.map(|op| op.id).as_deref(), Some("op-1"));
        assert_eq!(handler.mutations.load(Ordering::SeqCst), 1);
        assert_eq!(handler.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_residual_difference_is_reported() {
        let api = status_api(&[]);
        let handler = FakeNamespace::new(Some(typed(json!({"name": "ns-1", "retention": 7}))));
        let desired = typed(json!({"name": "ns-1", "retention": 30}));

        let report = Converger::new(&api)
            .converge(&CallContext::new(), &handler, &json!({}), None, Some(&desired))
            .await
            .unwrap();

        assert_eq!(report.plan.diff_type, DiffType::Create);
        assert_eq!(report.outcome, ConvergenceOutcome::Residual);
        assert_eq!(report.residual.len(), 1);
        assert_eq!(report.residual[0].field, "retention");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_converges_when_resource_is_gone() {
        let api = status_api(&[]);
        let handler = FakeNamespace::new(None);
        let prior = typed(json!({"name": "ns-1"}));

        let report = Converger::new(&api)
            .converge(&CallContext::new(), &handler, &json!({}), Some(&prior), None)
            .await
            .unwrap();

        assert_eq!(report.plan.diff_type, DiffType::Delete);
        assert_eq!(report.outcome, ConvergenceOutcome::Converged);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_mutation_failures_are_retried_with_one_request_id() {
        let api = status_api(&[]);
        let handler = FakeNamespace::new(Some(typed(json!({"name": "ns-2"})))).failing_first(2);
        let desired = typed(json!({"name": "ns-2"}));

        let report = Converger::new(&api)
            .converge(&CallContext::new(), &handler, &json!({}), None, Some(&desired))
            .await
            .unwrap();

        assert!(report.is_converged());
        assert_eq!(handler.mutations.load(Ordering::SeqCst), 3);
        let ids = handler.request_ids.lock().unwrap().clone();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| id == &ids[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_operation_propagates() {
        let api = status_api(&["in_progress", "failed"]);
        let handler = FakeNamespace::new(None);
        let desired = typed(json!({"name": "ns-1"}));

        let err = Converger::new(&api)
            .converge(&CallContext::new(), &handler, &json!({}), None, Some(&desired))
            .await
            .unwrap_err();

        match err {
            ProviderError::Operation(OperationError::Failed { reason, .. }) => {
                assert_eq!(reason, "namespace quota exceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(handler.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout_bounds_the_operation() {
        let mut api = MockOperationStatusApi::new();
        api.expect_get_operation().returning(|_, id| {
            Ok(AsyncOperation {
                id: id.to_string(),
                state: String::from("in_progress"),
                ..AsyncOperation::default()
            })
        });
        let handler = FakeNamespace::new(None);
        let desired = typed(json!({"name": "ns-1"}));

        let err = Converger::new(&api)
            .with_wait_timeout(Duration::from_secs(5))
            .converge(&CallContext::new(), &handler, &json!({}), None, Some(&desired))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProviderError::Operation(OperationError::Interrupted { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_mutation_error() {
        struct Forbidden;

        #[async_trait]
        impl ResourceHandler for Forbidden {
            type Request = ();

            fn name(&self) -> &str {
                "ns-9"
            }

            async fn mutate(
                &self,
                _ctx: &CallContext,
                _request: &(),
                _options: CallOptions,
            ) -> std::result::Result<AsyncOperation, RpcStatus> {
                Err(RpcStatus::new(StatusCode::PermissionDenied, "not an admin"))
            }

            async fn read(
                &self,
                _ctx: &CallContext,
            ) -> std::result::Result<Option<ResourceState>, RpcStatus> {
                Ok(None)
            }
        }

        let api = MockOperationStatusApi::new();
        let desired = typed(json!({"name": "ns-9"}));

        let err = Converger::new(&api)
            .converge(&CallContext::new(), &Forbidden, &(), None, Some(&desired))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProviderError::Transport(TransportError::Terminal { .. })
        ));
        assert_eq!(err.status_code(), Some(StatusCode::PermissionDenied));
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_drift() {
        let api = MockOperationStatusApi::new();
        let prior = typed(json!({"name": "ns-1", "roles": ["a"]}));
        let converger = Converger::new(&api);

        let same = FakeNamespace::new(Some(typed(json!({"name": "ns-1", "roles": ["a"]}))));
        let diff = converger
            .check_drift(&CallContext::new(), &same, &prior)
            .await
            .unwrap();
        assert_eq!(diff.diff_type, DiffType::NoChange);

        let gone = FakeNamespace::new(None);
        let diff = converger
            .check_drift(&CallContext::new(), &gone, &prior)
            .await
            .unwrap();
        assert_eq!(diff.diff_type, DiffType::Drift);
    }
}
