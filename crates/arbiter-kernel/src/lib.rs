//! The authority facade.
//!
//! [`Authority::call`] is the only way into the pipeline:
//!
//! validate -> guard -> route -> execute -> audit -> chronicle
//!
//! Every call, whatever its outcome, yields exactly one [`CallResponse`] and
//! exactly one chronicle append.

pub mod global;

use std::sync::Arc;
use std::time::Instant;

use arbiter_audit::{Auditor, CallIdentity, ContentHasher};
use arbiter_chronicle::{Chronicle, ChronicleStats};
use arbiter_executor::ModuleExecutor;
use arbiter_policy::{
    ContextDefaults, GuardContext, GuardEngine, SessionContexts, StaticGuardEngine,
};
use arbiter_protocol::{
    AuthorityConfig, AuthorityError, AuthorityResult, CallError, CallInput, CallResponse,
    ChronicleEntry, ModuleAdapter, ModuleId, ResponseId, SemVer, SessionId,
};
use arbiter_replay::{BatchReport, ReplayEngine, ReplayOutcome};
use arbiter_router::{AdapterRegistry, Router, adapter_id_for};
use arbiter_validator::RequestValidator;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::field::{Empty, display};
use tracing::{Span, debug, error, info, instrument, warn};

pub use arbiter_protocol as protocol;

pub struct AuthorityBuilder {
    config: AuthorityConfig,
    adapters: Vec<Arc<dyn ModuleAdapter>>,
    chronicle: Option<Chronicle>,
}

impl AuthorityBuilder {
    pub fn new(config: AuthorityConfig) -> Self {
        Self {
            config,
            adapters: Vec::new(),
            chronicle: None,
        }
    }

    pub fn register_adapter(mut self, adapter: Arc<dyn ModuleAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Continues an existing chronicle, e.g. one restored from an export.
    pub fn chronicle(mut self, chronicle: Chronicle) -> Self {
        self.chronicle = Some(chronicle);
        self
    }

    /// Fails on malformed configuration, a mislabeled adapter, or a resumed
    /// chronicle hashed with a different algorithm.
    pub fn build(self) -> AuthorityResult<Authority> {
        self.config.validate()?;

        let mut registry = AdapterRegistry::new();
        for adapter in self.adapters {
            registry.register(adapter)?;
        }
        for module in ModuleId::ALL {
            if !registry.contains(&adapter_id_for(module)) {
                warn!(module = %module, "no adapter registered, calls will fail to execute");
            }
        }

        let hasher = ContentHasher::new(self.config.hash_algorithm);
        let chronicle = match self.chronicle {
            Some(chronicle) if chronicle.hasher().algorithm() != hasher.algorithm() => {
                return Err(AuthorityError::InvalidConfiguration(format!(
                    "chronicle is hashed with {:?}, configuration selects {:?}",
                    chronicle.hasher().algorithm(),
                    hasher.algorithm()
                )));
            }
            Some(chronicle) => chronicle,
            None => Chronicle::from_config(&self.config),
        };

        let router = Router::new(Arc::new(registry));
        let executor = ModuleExecutor::new(router, self.config.default_timeout_ms);
        let auditor = Auditor::new(hasher);
        let registry_ref = executor.router().registry();
        let adapter_ids: Vec<&str> = registry_ref
            .ids()
            .map(|id| id.as_str())
            .collect();
        info!(
            adapters = ?adapter_ids,
            capacity = chronicle.capacity(),
            "authority built"
        );

        Ok(Authority {
            inner: Arc::new(AuthorityInner {
                validator: RequestValidator::new(),
                guards: StaticGuardEngine::from_config(&self.config),
                sessions: SessionContexts::new(ContextDefaults::from_config(&self.config)),
                replay: ReplayEngine::new(executor.clone(), auditor),
                executor,
                auditor,
                chronicle: Arc::new(chronicle),
                config: self.config,
            }),
        })
    }
}

#[derive(Debug)]
struct AuthorityInner {
    config: AuthorityConfig,
    validator: RequestValidator,
    guards: StaticGuardEngine,
    sessions: SessionContexts,
    executor: ModuleExecutor,
    auditor: Auditor,
    chronicle: Arc<Chronicle>,
    replay: ReplayEngine,
}

#[derive(Debug, Clone)]
pub struct Authority {
    inner: Arc<AuthorityInner>,
}

impl Authority {
    pub fn builder(config: AuthorityConfig) -> AuthorityBuilder {
        AuthorityBuilder::new(config)
    }

    pub fn config(&self) -> &AuthorityConfig {
        &self.inner.config
    }

    #[instrument(
        skip_all,
        fields(request_id = Empty, session_id = Empty, route = Empty)
    )]
    pub async fn call(&self, input: impl Into<CallInput>) -> CallResponse {
        let input = input.into();
        let started = Instant::now();

        let validated = match self.inner.validator.validate(&input) {
            Ok(validated) => validated,
            Err(report) => {
                let identity = input.identity();
                let span = Span::current();
                span.record("route", display(identity.route()));
                debug!(layer = ?report.failed_layer(), "validation rejected input");
                return self.respond(
                    CallIdentity::from(&identity),
                    &raw_input(&input),
                    identity.route(),
                    Err(report.to_call_error()),
                    None,
                    started,
                );
            }
        };

        let request = validated.request;
        let route = request.route();
        let span = Span::current();
        span.record("request_id", display(&request.request_id));
        span.record("session_id", display(&request.session_id));
        span.record("route", display(&route));

        let now = Utc::now();
        let context = self.inner.sessions.get_or_create(&request.session_id, now);
        if let Err(violation) = self.inner.guards.evaluate(&request, &context, now) {
            debug!(rule = violation.rule.name(), "guard rejected request");
            return self.respond(
                CallIdentity::from(&request),
                &validated.raw,
                route,
                Err(violation.to_call_error()),
                None,
                started,
            );
        }

        let decision = match self.inner.executor.router().route(&request) {
            Ok(decision) => decision,
            Err(error) => {
                return self.respond(
                    CallIdentity::from(&request),
                    &validated.raw,
                    route,
                    Err(error),
                    None,
                    started,
                );
            }
        };

        let execution = self.inner.executor.execute(&decision, &request).await;
        if execution.is_success() {
            self.inner
                .sessions
                .mark_completed(&request.session_id, request.module);
        }
        self.respond(
            CallIdentity::from(&request),
            &validated.raw,
            route,
            execution.outcome,
            execution.module_version,
            started,
        )
    }

    /// Audits, chronicles and wraps one outcome. A failed append is logged and
    /// does not alter the response.
    fn respond(
        &self,
        identity: CallIdentity,
        input: &Value,
        route: String,
        outcome: Result<Value, CallError>,
        module_version: Option<SemVer>,
        started: Instant,
    ) -> CallResponse {
        let response_id = ResponseId::new_uuid();
        let auditor = self.inner.auditor;
        let summary = auditor.summarize(
            input,
            outcome.as_ref(),
            route,
            started.elapsed(),
            module_version,
        );
        let request_id = identity.request_id.clone();
        let entry = auditor.entry(
            summary.clone(),
            identity,
            response_id.clone(),
            outcome.as_ref().err(),
        );
        if let Err(append_error) = self.inner.chronicle.append(entry) {
            error!(error = %append_error, "chronicle append failed");
        }

        match outcome {
            Ok(result) => {
                debug!(duration_ms = summary.duration_ms, "call succeeded");
                CallResponse::succeeded(request_id, response_id, result, summary)
            }
            Err(call_error) => {
                warn!(
                    code = %call_error.code,
                    category = ?call_error.category(),
                    recoverable = call_error.recoverable,
                    duration_ms = summary.duration_ms,
                    "call failed"
                );
                CallResponse::failed(request_id, response_id, call_error, summary)
            }
        }
    }

    /// Registers `session_id` with an explicit expiry, replacing any context
    /// it already had.
    pub fn open_session(
        &self,
        session_id: SessionId,
        expires_at: DateTime<Utc>,
    ) -> GuardContext {
        self.inner.sessions.open(session_id, expires_at)
    }

    pub fn session_context(&self, session_id: &SessionId) -> Option<GuardContext> {
        self.inner.sessions.snapshot(session_id)
    }

    /// Evicts session contexts that expired more than one TTL ago. The store
    /// also does this on its own once it grows past its watermark.
    pub fn prune_sessions(&self) -> usize {
        self.inner.sessions.prune_expired(Utc::now())
    }

    pub fn chronicle(&self) -> &Arc<Chronicle> {
        &self.inner.chronicle
    }

    pub fn verify_chronicle(&self) -> AuthorityResult<()> {
        self.inner.chronicle.verify()
    }

    pub fn chronicle_stats(&self) -> ChronicleStats {
        self.inner.chronicle.stats()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ChronicleEntry>> {
        self.inner.chronicle.subscribe()
    }

    /// Replays the entry at `index`. Replays are never chronicled.
    pub async fn replay(&self, index: u64) -> Option<ReplayOutcome> {
        let entry = self.inner.chronicle.get(index)?;
        Some(self.inner.replay.replay(&entry).await)
    }

    pub async fn replay_with_payload(&self, index: u64, payload: Value) -> Option<ReplayOutcome> {
        let entry = self.inner.chronicle.get(index)?;
        Some(self.inner.replay.replay_with_payload(&entry, payload).await)
    }

    pub async fn replay_all(&self, stop_on_mismatch: bool) -> BatchReport {
        let entries = self.inner.chronicle.entries();
        self.inner
            .replay
            .replay_batch(&entries, stop_on_mismatch)
            .await
    }
}

/// Best-effort JSON form of an input that failed validation.
fn raw_input(input: &CallInput) -> Value {
    match input {
        CallInput::Request(request) => serde_json::to_value(request).unwrap_or(Value::Null),
        CallInput::Json(value) => value.clone(),
        CallInput::Text(text) => {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
        }
    }
}
