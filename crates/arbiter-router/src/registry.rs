use std::fmt;
use std::sync::Arc;

use arbiter_protocol::{AdapterId, AuthorityError, AuthorityResult, ModuleAdapter, ModuleId};
use indexmap::IndexMap;
use tracing::debug;

/// Fixed adapter id every module routes to.
pub fn adapter_id_for(module: ModuleId) -> AdapterId {
    let id = match module {
        ModuleId::Oracle => "oracle.v1",
        ModuleId::Muse => "muse.v1",
        ModuleId::Scribe => "scribe.v1",
    };
    AdapterId::new(id)
}

/// Live adapters keyed by adapter id, filled once at startup.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: IndexMap<AdapterId, Arc<dyn ModuleAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `adapter` under its id. Re-registering an id keeps the first
    /// instance and returns `Ok(false)`.
    pub fn register(&mut self, adapter: Arc<dyn ModuleAdapter>) -> AuthorityResult<bool> {
        let id = adapter.id();
        let expected = adapter_id_for(adapter.module());
        if id != expected {
            return Err(AuthorityError::Registration(format!(
                "adapter `{id}` declares module {} whose adapter id is `{expected}`",
                adapter.module()
            )));
        }
        if self.adapters.contains_key(&id) {
            debug!(adapter_id = %id, "adapter already registered, keeping the first");
            return Ok(false);
        }
        debug!(adapter_id = %id, version = %adapter.version(), "adapter registered");
        self.adapters.insert(id, adapter);
        Ok(true)
    }

    pub fn get(&self, id: &AdapterId) -> Option<Arc<dyn ModuleAdapter>> {
        self.adapters.get(id).cloned()
    }

    pub fn contains(&self, id: &AdapterId) -> bool {
        self.adapters.contains_key(id)
    }

    /// Registered ids, in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &AdapterId> {
        self.adapters.keys()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}
