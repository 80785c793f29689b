//! Call requests and the raw input accepted by the authority's entry point.

use crate::ids::{RequestId, SessionId};
use crate::module::{CallerKind, ModuleId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A fully typed call. Built by the caller, never mutated by the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    pub request_id: RequestId,
    pub session_id: SessionId,
    pub caller: CallerKind,
    pub module: ModuleId,
    pub action: String,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl CallRequest {
    /// New request with fresh random request id.
    pub fn new(
        session_id: SessionId,
        caller: CallerKind,
        module: ModuleId,
        action: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            request_id: RequestId::new_uuid(),
            session_id,
            caller,
            module,
            action: action.into(),
            payload,
            seed: None,
            timeout_ms: None,
            version: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// `MODULE.action`, the route string recorded in audit summaries.
    pub fn route(&self) -> String {
        format!("{}.{}", self.module.as_str(), self.action)
    }
}

/// Anything the entry point accepts: a typed request, a JSON value, or raw text.
#[derive(Debug, Clone, PartialEq)]
pub enum CallInput {
    Request(CallRequest),
    Json(Value),
    Text(String),
}

impl CallInput {
    /// Identifying fields extracted on a best-effort basis, for auditing
    /// inputs that never made it through validation.
    pub fn identity(&self) -> InputIdentity {
        match self {
            Self::Request(request) => InputIdentity {
                request_id: Some(request.request_id.clone()),
                session_id: Some(request.session_id.clone()),
                caller: Some(request.caller),
                module: Some(request.module.as_str().to_owned()),
                action: Some(request.action.clone()),
                seed: request.seed,
                timeout_ms: request.timeout_ms,
            },
            Self::Json(value) => InputIdentity::from_value(value),
            Self::Text(text) => serde_json::from_str::<Value>(text)
                .map(|value| InputIdentity::from_value(&value))
                .unwrap_or_default(),
        }
    }
}

impl From<CallRequest> for CallInput {
    fn from(request: CallRequest) -> Self {
        Self::Request(request)
    }
}

impl From<Value> for CallInput {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for CallInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for CallInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

/// Loosely extracted identity of an input that may be invalid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputIdentity {
    pub request_id: Option<RequestId>,
    pub session_id: Option<SessionId>,
    pub caller: Option<CallerKind>,
    pub module: Option<String>,
    pub action: Option<String>,
    pub seed: Option<u64>,
    pub timeout_ms: Option<u64>,
}

impl InputIdentity {
    fn from_value(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(ToOwned::to_owned);
        Self {
            request_id: text("request_id").map(RequestId::from),
            session_id: text("session_id").map(SessionId::from),
            caller: text("caller").and_then(|caller| caller.parse().ok()),
            module: text("module"),
            action: text("action"),
            seed: value.get("seed").and_then(Value::as_u64),
            timeout_ms: value.get("timeout_ms").and_then(Value::as_u64),
        }
    }

    /// Best-effort `MODULE.action` route.
    pub fn route(&self) -> String {
        format!(
            "{}.{}",
            self.module.as_deref().unwrap_or("UNKNOWN"),
            self.action.as_deref().unwrap_or("unknown")
        )
    }
}
