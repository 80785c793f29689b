//! Invokes the adapter behind a routing decision, racing it against the
//! request's deadline.
//!
//! The adapter runs on its own task. When the deadline wins the executor
//! stops waiting and drops the handle; the task is detached, not aborted.

use std::time::Duration;

use arbiter_protocol::{CallError, CallRequest, ErrorCode, SemVer};
use arbiter_router::{Router, RoutingDecision};
use serde_json::{Value, json};
use tokio::time::{Instant, timeout};
use tracing::{debug, instrument, warn};

/// Outcome of one adapter invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub outcome: Result<Value, CallError>,
    /// Version the resolved adapter declared; `None` when nothing resolved.
    pub module_version: Option<SemVer>,
    /// Wall-clock time spent, whichever branch finished.
    pub duration: Duration,
}

impl Execution {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn duration_ms(&self) -> u64 {
        duration_ms(self.duration)
    }
}

#[derive(Debug, Clone)]
pub struct ModuleExecutor {
    router: Router,
    default_timeout_ms: u64,
}

impl ModuleExecutor {
    pub fn new(router: Router, default_timeout_ms: u64) -> Self {
        Self {
            router,
            default_timeout_ms,
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn default_timeout_ms(&self) -> u64 {
        self.default_timeout_ms
    }

    #[instrument(
        skip(self, decision, request),
        fields(
            request_id = %request.request_id,
            route = %decision.route(),
            adapter_id = %decision.adapter_id
        )
    )]
    pub async fn execute(&self, decision: &RoutingDecision, request: &CallRequest) -> Execution {
        let started = Instant::now();
        let Some(adapter) = self.router.resolve(decision) else {
            warn!("no adapter registered");
            return Execution {
                outcome: Err(CallError::new(
                    ErrorCode::ExecutionFailed,
                    format!("no adapter registered for `{}`", decision.adapter_id),
                )
                .with_recoverable(false)),
                module_version: None,
                duration: started.elapsed(),
            };
        };

        let module_version = adapter.version();
        let timeout_ms = request.timeout_ms.unwrap_or(self.default_timeout_ms);
        let action = decision.action.clone();
        let payload = request.payload.clone();
        let seed = request.seed;
        let task = tokio::spawn(async move { adapter.invoke(&action, &payload, seed).await });

        let outcome = match timeout(Duration::from_millis(timeout_ms), task).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(error))) => {
                warn!(error = %error, "adapter failed");
                Err(CallError::new(ErrorCode::ModuleError, format!("{error:#}"))
                    .with_recoverable(false))
            }
            Ok(Err(join_error)) => {
                warn!(error = %join_error, "adapter task did not complete");
                Err(CallError::new(
                    ErrorCode::ModuleError,
                    format!("adapter task failed: {join_error}"),
                )
                .with_recoverable(false))
            }
            Err(_) => {
                let elapsed_ms = duration_ms(started.elapsed());
                warn!(timeout_ms, elapsed_ms, "adapter deadline elapsed");
                Err(CallError::new(
                    ErrorCode::Timeout,
                    format!("{} did not finish within {timeout_ms}ms", decision.route()),
                )
                .with_recoverable(true)
                .with_retry_after_ms(timeout_ms)
                .with_details(json!({
                    "timeout_ms": timeout_ms,
                    "elapsed_ms": elapsed_ms,
                })))
            }
        };

        let duration = started.elapsed();
        debug!(
            success = outcome.is_ok(),
            duration_ms = duration_ms(duration),
            "adapter execution finished"
        );
        Execution {
            outcome,
            module_version: Some(module_version),
            duration,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use arbiter_protocol::{AdapterId, CallerKind, ModuleAdapter, ModuleId, SessionId};
    use arbiter_router::AdapterRegistry;
    use async_trait::async_trait;

    enum Behavior {
        Echo,
        Sleep(Duration, Arc<AtomicBool>),
        Fail,
        Panic,
    }

    struct Scripted(Behavior);

    #[async_trait]
    impl ModuleAdapter for Scripted {
        fn id(&self) -> AdapterId {
            AdapterId::new("oracle.v1")
        }

        fn module(&self) -> ModuleId {
            ModuleId::Oracle
        }

        fn version(&self) -> SemVer {
            SemVer::new(1, 2, 0)
        }

        async fn invoke(
            &self,
            action: &str,
            payload: &Value,
            seed: Option<u64>,
        ) -> anyhow::Result<Value> {
            match &self.0 {
                Behavior::Echo => Ok(json!({"action": action, "payload": payload, "seed": seed})),
                Behavior::Sleep(delay, finished) => {
                    tokio::time::sleep(*delay).await;
                    finished.store(true, Ordering::SeqCst);
                    Ok(json!({"late": true}))
                }
                Behavior::Fail => anyhow::bail!("model unavailable"),
                Behavior::Panic => panic!("adapter bug"),
            }
        }
    }

    fn executor(behavior: Behavior) -> ModuleExecutor {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(Scripted(behavior))).unwrap();
        ModuleExecutor::new(Router::new(Arc::new(registry)), 30_000)
    }

    fn request() -> CallRequest {
        CallRequest::new(
            SessionId::new_uuid(),
            CallerKind::Human,
            ModuleId::Oracle,
            "analyze",
            json!({"text": "hello"}),
        )
        .with_seed(5)
    }

    async fn run(executor: &ModuleExecutor, request: &CallRequest) -> Execution {
        let decision = executor.router().route(request).unwrap();
        executor.execute(&decision, request).await
    }

    #[tokio::test]
    async fn completion_captures_value_and_version() {
        let execution = run(&executor(Behavior::Echo), &request()).await;
        let value = execution.outcome.unwrap();
        assert_eq!(value["action"], "analyze");
        assert_eq!(value["seed"], 5);
        assert_eq!(execution.module_version, Some(SemVer::new(1, 2, 0)));
    }

    #[tokio::test]
    async fn deadline_wins_without_aborting_the_adapter() {
        let finished = Arc::new(AtomicBool::new(false));
        let executor = executor(Behavior::Sleep(
            Duration::from_millis(300),
            finished.clone(),
        ));
        let request = request().with_timeout_ms(50);
        let execution = run(&executor, &request).await;

        let error = execution.outcome.as_ref().unwrap_err();
        assert_eq!(error.code, ErrorCode::Timeout);
        assert!(error.recoverable);
        assert_eq!(error.retry_after_ms, Some(50));
        assert_eq!(error.details.as_ref().unwrap()["timeout_ms"], 50);
        assert!(execution.duration_ms() >= 50);
        assert!(!finished.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn adapter_failure_is_a_module_error() {
        let execution = run(&executor(Behavior::Fail), &request()).await;
        let error = execution.outcome.unwrap_err();
        assert_eq!(error.code, ErrorCode::ModuleError);
        assert!(!error.recoverable);
        assert!(error.message.contains("model unavailable"));
    }

    #[tokio::test]
    async fn adapter_panic_is_a_module_error() {
        let execution = run(&executor(Behavior::Panic), &request()).await;
        assert_eq!(execution.outcome.unwrap_err().code, ErrorCode::ModuleError);
    }

    #[tokio::test]
    async fn missing_adapter_fails_immediately() {
        let executor = ModuleExecutor::new(Router::default(), 30_000);
        let execution = run(&executor, &request()).await;
        let error = execution.outcome.unwrap_err();
        assert_eq!(error.code, ErrorCode::ExecutionFailed);
        assert!(!error.recoverable);
        assert!(execution.module_version.is_none());
    }
}
