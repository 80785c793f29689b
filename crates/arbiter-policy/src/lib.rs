//! Guard engine: six ordered, fail-fast precondition rules evaluated over a
//! validated request and its session's [`GuardContext`].

pub mod context;
pub mod rules;

use arbiter_audit::canonical_size;
use arbiter_protocol::{AuthorityConfig, CallRequest, MAX_PAYLOAD_BYTES, ModuleId, SemVer};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

pub use context::{ContextDefaults, GuardContext, PRUNE_WATERMARK, SessionContexts};
pub use rules::{GuardRule, GuardViolation};

/// Minimum characters of semantic context a module must receive.
pub const MIN_CONTEXT_CHARS: usize = 50;

pub trait GuardEngine: Send + Sync {
    /// First violated rule in [`GuardRule::ORDERED`] order, if any.
    fn evaluate(
        &self,
        request: &CallRequest,
        context: &GuardContext,
        now: DateTime<Utc>,
    ) -> Result<(), GuardViolation>;
}

#[derive(Debug, Clone)]
pub struct StaticGuardEngine {
    max_payload_bytes: usize,
    min_context_chars: usize,
}

impl Default for StaticGuardEngine {
    fn default() -> Self {
        Self {
            max_payload_bytes: MAX_PAYLOAD_BYTES,
            min_context_chars: MIN_CONTEXT_CHARS,
        }
    }
}

impl StaticGuardEngine {
    pub fn from_config(config: &AuthorityConfig) -> Self {
        Self {
            max_payload_bytes: config.max_payload_bytes,
            ..Self::default()
        }
    }

    /// Every failing rule, in order. Diagnostic only; [`GuardEngine::evaluate`]
    /// stays fail-fast.
    pub fn evaluate_all(
        &self,
        request: &CallRequest,
        context: &GuardContext,
        now: DateTime<Utc>,
    ) -> Vec<GuardViolation> {
        GuardRule::ORDERED
            .into_iter()
            .filter_map(|rule| self.check(rule, request, context, now).err())
            .collect()
    }

    fn check(
        &self,
        rule: GuardRule,
        request: &CallRequest,
        context: &GuardContext,
        now: DateTime<Utc>,
    ) -> Result<(), GuardViolation> {
        match rule {
            GuardRule::Prerequisite => Self::check_prerequisite(request, context),
            GuardRule::SemanticContext => self.check_semantic_context(request),
            GuardRule::PayloadSize => self.check_payload_size(request),
            GuardRule::VersionCompatibility => Self::check_version(request, context),
            GuardRule::CallerAllowed => Self::check_caller(request, context),
            GuardRule::SessionActive => Self::check_session(context, now),
        }
    }

    fn check_prerequisite(
        request: &CallRequest,
        context: &GuardContext,
    ) -> Result<(), GuardViolation> {
        match request.module.prerequisite() {
            Some(required) if !context.has_completed(required) => Err(GuardViolation::new(
                GuardRule::Prerequisite,
                format!(
                    "{} requires a completed {required} call in this session",
                    request.module
                ),
            )),
            _ => Ok(()),
        }
    }

    fn check_semantic_context(&self, request: &CallRequest) -> Result<(), GuardViolation> {
        let Some(field) = semantic_context_field(request.module) else {
            return Ok(());
        };
        let chars = request
            .payload
            .get(field)
            .and_then(Value::as_str)
            .map_or(0, |text| text.trim().chars().count());
        if chars < self.min_context_chars {
            return Err(GuardViolation::new(
                GuardRule::SemanticContext,
                format!(
                    "payload.{field} has {chars} characters, {} requires at least {}",
                    request.module, self.min_context_chars
                ),
            ));
        }
        Ok(())
    }

    fn check_payload_size(&self, request: &CallRequest) -> Result<(), GuardViolation> {
        let size = canonical_size(&request.payload);
        if size > self.max_payload_bytes {
            return Err(GuardViolation::new(
                GuardRule::PayloadSize,
                format!(
                    "payload is {size} bytes, ceiling is {}",
                    self.max_payload_bytes
                ),
            ));
        }
        Ok(())
    }

    fn check_version(request: &CallRequest, context: &GuardContext) -> Result<(), GuardViolation> {
        let Some(pinned) = request.version.as_deref() else {
            debug!(module = %request.module, "no version pinned, any available version accepted");
            return Ok(());
        };
        let requested: SemVer = pinned.parse().map_err(|error| {
            GuardViolation::new(GuardRule::VersionCompatibility, format!("{error}"))
        })?;
        let Some(available) = context.available_version(request.module) else {
            return Err(GuardViolation::new(
                GuardRule::VersionCompatibility,
                format!("no version of {} is available", request.module),
            ));
        };
        if !available.satisfies(&requested) {
            return Err(GuardViolation::new(
                GuardRule::VersionCompatibility,
                format!(
                    "{} {available} does not satisfy pinned {requested}",
                    request.module
                ),
            ));
        }
        Ok(())
    }

    fn check_caller(request: &CallRequest, context: &GuardContext) -> Result<(), GuardViolation> {
        if !context.allows_caller(request.caller) {
            return Err(GuardViolation::new(
                GuardRule::CallerAllowed,
                format!("caller kind `{}` is not allowed in this session", request.caller),
            ));
        }
        Ok(())
    }

    fn check_session(context: &GuardContext, now: DateTime<Utc>) -> Result<(), GuardViolation> {
        if context.is_expired(now) {
            return Err(GuardViolation::new(
                GuardRule::SessionActive,
                format!("session expired at {}", context.expires_at.to_rfc3339()),
            ));
        }
        Ok(())
    }
}

impl GuardEngine for StaticGuardEngine {
    fn evaluate(
        &self,
        request: &CallRequest,
        context: &GuardContext,
        now: DateTime<Utc>,
    ) -> Result<(), GuardViolation> {
        for rule in GuardRule::ORDERED {
            self.check(rule, request, context, now)?;
            debug!(rule = rule.name(), "guard rule passed");
        }
        Ok(())
    }
}

/// Payload field carrying a module's semantic context.
fn semantic_context_field(module: ModuleId) -> Option<&'static str> {
    match module {
        ModuleId::Oracle => Some("text"),
        ModuleId::Muse | ModuleId::Scribe => None,
    }
}
