//! Deterministic routing of `(module, action)` to a fixed adapter id, and the
//! registry that resolves ids to live adapters.

mod registry;

use std::sync::Arc;

use arbiter_protocol::{
    AdapterId, CallError, CallRequest, ErrorCode, ModuleAdapter, ModuleId,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub use registry::{AdapterRegistry, adapter_id_for};

/// Derived per call, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub module: ModuleId,
    pub action: String,
    pub adapter_id: AdapterId,
}

impl RoutingDecision {
    pub fn route(&self) -> String {
        format!("{}.{}", self.module.as_str(), self.action)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Router {
    registry: Arc<AdapterRegistry>,
}

impl Router {
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> Arc<AdapterRegistry> {
        self.registry.clone()
    }

    pub fn route(&self, request: &CallRequest) -> Result<RoutingDecision, CallError> {
        Self::decide(request.module, &request.action)
    }

    /// Routes a `MODULE.action` string, as recorded in audit summaries.
    pub fn route_str(&self, route: &str) -> Result<RoutingDecision, CallError> {
        let (module, action) = route.split_once('.').ok_or_else(|| {
            CallError::new(
                ErrorCode::RoutingFailed,
                format!("route `{route}` is not of the form MODULE.action"),
            )
        })?;
        let module: ModuleId = module.parse().map_err(|_| {
            CallError::new(
                ErrorCode::RoutingFailed,
                format!("unknown module `{module}`"),
            )
            .with_details(json!({
                "valid_modules": ModuleId::ALL.map(|module| module.as_str()),
            }))
        })?;
        Self::decide(module, action)
    }

    /// Pure table lookup; the registry is not consulted.
    pub fn decide(module: ModuleId, action: &str) -> Result<RoutingDecision, CallError> {
        if !module.allows_action(action) {
            let valid = module.allowed_actions();
            return Err(CallError::new(
                ErrorCode::RoutingFailed,
                format!(
                    "no route for {module}.{action}, valid actions: {}",
                    valid.join(", ")
                ),
            )
            .with_details(json!({ "valid_actions": valid })));
        }
        Ok(RoutingDecision {
            module,
            action: action.to_owned(),
            adapter_id: adapter_id_for(module),
        })
    }

    /// Live adapter for a decision, if one was registered.
    pub fn resolve(&self, decision: &RoutingDecision) -> Option<Arc<dyn ModuleAdapter>> {
        self.registry.get(&decision.adapter_id)
    }
}
