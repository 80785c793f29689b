//! Session-scoped facts the guard rules read, and the store that owns them.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use arbiter_protocol::{AuthorityConfig, CallerKind, ModuleId, SemVer, SessionId};
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexSet;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardContext {
    pub session_id: SessionId,
    /// Modules with a completed call in this session.
    pub satisfied: BTreeSet<ModuleId>,
    pub expires_at: DateTime<Utc>,
    pub allowed_callers: IndexSet<CallerKind>,
    pub module_versions: BTreeMap<ModuleId, SemVer>,
}

impl GuardContext {
    pub fn has_completed(&self, module: ModuleId) -> bool {
        self.satisfied.contains(&module)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn allows_caller(&self, caller: CallerKind) -> bool {
        self.allowed_callers.contains(&caller)
    }

    pub fn available_version(&self, module: ModuleId) -> Option<SemVer> {
        self.module_versions.get(&module).copied()
    }
}

/// Template new sessions are created from.
#[derive(Debug, Clone)]
pub struct ContextDefaults {
    pub session_ttl: Duration,
    pub allowed_callers: IndexSet<CallerKind>,
    pub module_versions: BTreeMap<ModuleId, SemVer>,
}

impl ContextDefaults {
    pub fn from_config(config: &AuthorityConfig) -> Self {
        let session_ttl = i64::try_from(config.session_ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self {
            session_ttl,
            allowed_callers: config.allowed_callers.iter().copied().collect(),
            module_versions: ModuleId::ALL
                .into_iter()
                .filter_map(|module| Some((module, config.available_version(module)?)))
                .collect(),
        }
    }

    fn context_for(&self, session_id: SessionId, expires_at: DateTime<Utc>) -> GuardContext {
        GuardContext {
            session_id,
            satisfied: BTreeSet::new(),
            expires_at,
            allowed_callers: self.allowed_callers.clone(),
            module_versions: self.module_versions.clone(),
        }
    }
}

/// Store size at which creating a new context first triggers a prune.
pub const PRUNE_WATERMARK: usize = 1_024;

/// All live session contexts behind a single lock. Writers are exclusive,
/// readers shared.
///
/// An expired context is kept for one more TTL so calls on it keep failing
/// with an expiry; after that it is pruned and the id starts over with an
/// empty context.
#[derive(Debug, Clone)]
pub struct SessionContexts {
    defaults: Arc<ContextDefaults>,
    contexts: Arc<RwLock<HashMap<SessionId, GuardContext>>>,
    watermark: Arc<AtomicUsize>,
}

impl SessionContexts {
    pub fn new(defaults: ContextDefaults) -> Self {
        Self {
            defaults: Arc::new(defaults),
            contexts: Arc::new(RwLock::new(HashMap::new())),
            watermark: Arc::new(AtomicUsize::new(PRUNE_WATERMARK)),
        }
    }

    /// Registers a session with an explicit expiry, replacing any previous
    /// context for it.
    pub fn open(&self, session_id: SessionId, expires_at: DateTime<Utc>) -> GuardContext {
        let context = self.defaults.context_for(session_id.clone(), expires_at);
        self.contexts.write().insert(session_id, context.clone());
        context
    }

    /// Current context, created on first sight with the default TTL. Creating
    /// a context once the store reaches its watermark prunes it first.
    pub fn get_or_create(&self, session_id: &SessionId, now: DateTime<Utc>) -> GuardContext {
        if let Some(context) = self.contexts.read().get(session_id) {
            return context.clone();
        }
        let mut contexts = self.contexts.write();
        if !contexts.contains_key(session_id)
            && contexts.len() >= self.watermark.load(Ordering::Relaxed)
        {
            let removed = self.prune_locked(&mut contexts, now);
            let next = (contexts.len() * 2).max(PRUNE_WATERMARK);
            self.watermark.store(next, Ordering::Relaxed);
            debug!(removed, live = contexts.len(), next, "session contexts pruned");
        }
        contexts
            .entry(session_id.clone())
            .or_insert_with(|| {
                debug!(session_id = %session_id, "session context created");
                let expires_at = now
                    .checked_add_signed(self.defaults.session_ttl)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                self.defaults.context_for(session_id.clone(), expires_at)
            })
            .clone()
    }

    /// Records a completed call of `module`, visible to the next evaluation.
    pub fn mark_completed(&self, session_id: &SessionId, module: ModuleId) {
        if let Some(context) = self.contexts.write().get_mut(session_id)
            && context.satisfied.insert(module)
        {
            debug!(session_id = %session_id, module = %module, "session prerequisite satisfied");
        }
    }

    /// Drops contexts that expired more than one TTL before `now`. Returns
    /// how many were removed.
    pub fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let mut contexts = self.contexts.write();
        self.prune_locked(&mut contexts, now)
    }

    fn prune_locked(
        &self,
        contexts: &mut HashMap<SessionId, GuardContext>,
        now: DateTime<Utc>,
    ) -> usize {
        let ttl = self.defaults.session_ttl;
        let before = contexts.len();
        contexts.retain(|_, context| {
            context
                .expires_at
                .checked_add_signed(ttl)
                .is_none_or(|evict_after| now <= evict_after)
        });
        before - contexts.len()
    }

    pub fn snapshot(&self, session_id: &SessionId) -> Option<GuardContext> {
        self.contexts.read().get(session_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.contexts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionContexts {
        SessionContexts::new(ContextDefaults::from_config(&AuthorityConfig::default()))
    }

    #[test]
    fn contexts_are_created_lazily_with_ttl() {
        let contexts = store();
        let session = SessionId::new_uuid();
        let now = Utc::now();
        assert!(contexts.snapshot(&session).is_none());

        let context = contexts.get_or_create(&session, now);
        assert_eq!(context.expires_at, now + Duration::seconds(3_600));
        assert!(context.allows_caller(CallerKind::Human));
        assert_eq!(
            context.available_version(ModuleId::Muse),
            Some(SemVer::new(1, 0, 3))
        );
        assert_eq!(contexts.len(), 1);

        let again = contexts.get_or_create(&session, now + Duration::seconds(10));
        assert_eq!(again.expires_at, context.expires_at);
    }

    #[test]
    fn completion_is_visible_to_the_next_read() {
        let contexts = store();
        let session = SessionId::new_uuid();
        contexts.get_or_create(&session, Utc::now());
        contexts.mark_completed(&session, ModuleId::Oracle);
        assert!(
            contexts
                .get_or_create(&session, Utc::now())
                .has_completed(ModuleId::Oracle)
        );
    }

    #[test]
    fn open_overrides_expiry() {
        let contexts = store();
        let session = SessionId::new_uuid();
        let past = Utc::now() - Duration::seconds(5);
        contexts.open(session.clone(), past);
        assert!(contexts.get_or_create(&session, Utc::now()).is_expired(Utc::now()));
    }

    #[test]
    fn long_expired_sessions_are_evicted() {
        let contexts = store();
        let now = Utc::now();
        let stale = SessionId::new_uuid();
        let recent = SessionId::new_uuid();
        let live = SessionId::new_uuid();
        contexts.open(stale.clone(), now - Duration::hours(2));
        contexts.open(recent.clone(), now - Duration::minutes(5));
        contexts.get_or_create(&live, now);

        assert_eq!(contexts.prune_expired(now), 1);
        assert!(contexts.snapshot(&stale).is_none());
        assert!(contexts.snapshot(&recent).unwrap().is_expired(now));
        assert!(contexts.snapshot(&live).is_some());
        assert_eq!(contexts.prune_expired(now), 0);
    }

    #[test]
    fn reaching_the_watermark_prunes_before_inserting() {
        let contexts = store();
        let now = Utc::now();
        let long_ago = now - Duration::hours(3);
        for _ in 0..PRUNE_WATERMARK {
            contexts.get_or_create(&SessionId::new_uuid(), long_ago);
        }
        assert_eq!(contexts.len(), PRUNE_WATERMARK);

        let fresh = SessionId::new_uuid();
        contexts.get_or_create(&fresh, now);
        assert_eq!(contexts.len(), 1);
        assert!(contexts.snapshot(&fresh).is_some());
    }
}
