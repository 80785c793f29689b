//! Pure construction of audit summaries and entries.

use std::time::Duration;

use arbiter_protocol::{
    AuditEntry, AuditSummary, CallError, CallRequest, CallerKind, ContentHash, InputIdentity,
    RequestId, ResponseId, SemVer, SessionId,
};
use chrono::Utc;
use serde_json::{Value, json};

use crate::hasher::ContentHasher;

/// Who made a call, as far as it is known.
#[derive(Debug, Clone, PartialEq)]
pub struct CallIdentity {
    pub request_id: RequestId,
    pub session_id: SessionId,
    pub caller: Option<CallerKind>,
    pub seed: Option<u64>,
    pub timeout_ms: Option<u64>,
}

impl From<&CallRequest> for CallIdentity {
    fn from(request: &CallRequest) -> Self {
        Self {
            request_id: request.request_id.clone(),
            session_id: request.session_id.clone(),
            caller: Some(request.caller),
            seed: request.seed,
            timeout_ms: request.timeout_ms,
        }
    }
}

impl From<&InputIdentity> for CallIdentity {
    fn from(identity: &InputIdentity) -> Self {
        Self {
            request_id: identity.request_id.clone().unwrap_or_else(RequestId::unknown),
            session_id: identity.session_id.clone().unwrap_or_else(SessionId::unknown),
            caller: identity.caller,
            seed: identity.seed,
            timeout_ms: identity.timeout_ms,
        }
    }
}

/// Builds summaries and entries with one hasher.
#[derive(Debug, Clone, Copy, Default)]
pub struct Auditor {
    hasher: ContentHasher,
}

impl Auditor {
    pub fn new(hasher: ContentHasher) -> Self {
        Self { hasher }
    }

    pub fn hasher(&self) -> ContentHasher {
        self.hasher
    }

    /// Hash of a call's outcome. Errors hash over code and message only, so
    /// timing details never make two identical failures hash differently.
    pub fn hash_outcome(&self, outcome: Result<&Value, &CallError>) -> ContentHash {
        match outcome {
            Ok(value) => self.hasher.hash_value(value),
            Err(error) => self.hasher.hash_value(&json!({
                "error": {
                    "code": error.code,
                    "message": error.message,
                }
            })),
        }
    }

    pub fn summarize(
        &self,
        input: &Value,
        outcome: Result<&Value, &CallError>,
        route: impl Into<String>,
        duration: Duration,
        module_version: Option<SemVer>,
    ) -> AuditSummary {
        AuditSummary {
            input_hash: self.hasher.hash_value(input),
            output_hash: self.hash_outcome(outcome),
            route: route.into(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            timestamp: Utc::now(),
            module_version: module_version.map(|version| version.to_string()),
        }
    }

    pub fn entry(
        &self,
        summary: AuditSummary,
        identity: CallIdentity,
        response_id: ResponseId,
        error: Option<&CallError>,
    ) -> AuditEntry {
        AuditEntry {
            summary,
            request_id: identity.request_id,
            response_id,
            session_id: identity.session_id,
            caller: identity.caller,
            seed: identity.seed,
            timeout_ms: identity.timeout_ms,
            success: error.is_none(),
            error_code: error.map(|error| error.code),
        }
    }
}
