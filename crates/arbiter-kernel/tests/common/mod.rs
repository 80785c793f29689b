#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use arbiter_kernel::protocol::{
    AdapterId, AuthorityConfig, CallRequest, CallerKind, ModuleAdapter, ModuleId, SemVer,
    SessionId,
};
use arbiter_kernel::{Authority, AuthorityBuilder};
use async_trait::async_trait;
use serde_json::{Value, json};

pub const LONG_TEXT: &str =
    "The quarterly report shows steady growth across every region we operate in.";

/// Fixed-output adapter for any module; counts invocations.
pub struct Fixed {
    pub module: ModuleId,
    pub calls: AtomicUsize,
}

impl Fixed {
    pub fn new(module: ModuleId) -> Arc<Self> {
        Arc::new(Self {
            module,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModuleAdapter for Fixed {
    fn id(&self) -> AdapterId {
        AdapterId::new(format!("{}.v1", self.module.as_str().to_lowercase()))
    }

    fn module(&self) -> ModuleId {
        self.module
    }

    fn version(&self) -> SemVer {
        match self.module {
            ModuleId::Oracle => SemVer::new(1, 2, 0),
            ModuleId::Muse => SemVer::new(1, 0, 3),
            ModuleId::Scribe => SemVer::new(0, 9, 1),
        }
    }

    async fn invoke(
        &self,
        action: &str,
        _payload: &Value,
        seed: Option<u64>,
    ) -> anyhow::Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"module": self.module, "action": action, "seed": seed, "verdict": "ok"}))
    }
}

/// SCRIBE adapter that sleeps before answering.
pub struct Sleepy(pub Duration);

#[async_trait]
impl ModuleAdapter for Sleepy {
    fn id(&self) -> AdapterId {
        AdapterId::new("scribe.v1")
    }

    fn module(&self) -> ModuleId {
        ModuleId::Scribe
    }

    fn version(&self) -> SemVer {
        SemVer::new(0, 9, 1)
    }

    async fn invoke(
        &self,
        _action: &str,
        _payload: &Value,
        _seed: Option<u64>,
    ) -> anyhow::Result<Value> {
        tokio::time::sleep(self.0).await;
        Ok(json!({"rendered": true}))
    }
}

/// SCRIBE adapter that always fails.
pub struct Broken;

#[async_trait]
impl ModuleAdapter for Broken {
    fn id(&self) -> AdapterId {
        AdapterId::new("scribe.v1")
    }

    fn module(&self) -> ModuleId {
        ModuleId::Scribe
    }

    fn version(&self) -> SemVer {
        SemVer::new(0, 9, 1)
    }

    async fn invoke(
        &self,
        _action: &str,
        _payload: &Value,
        _seed: Option<u64>,
    ) -> anyhow::Result<Value> {
        anyhow::bail!("template store offline")
    }
}

pub struct Fixture {
    pub authority: Authority,
    pub oracle: Arc<Fixed>,
    pub muse: Arc<Fixed>,
    pub scribe: Arc<Fixed>,
}

pub fn fixture() -> Fixture {
    fixture_with(AuthorityConfig::default())
}

pub fn fixture_with(config: AuthorityConfig) -> Fixture {
    let oracle = Fixed::new(ModuleId::Oracle);
    let muse = Fixed::new(ModuleId::Muse);
    let scribe = Fixed::new(ModuleId::Scribe);
    let authority = AuthorityBuilder::new(config)
        .register_adapter(oracle.clone())
        .register_adapter(muse.clone())
        .register_adapter(scribe.clone())
        .build()
        .expect("fixture authority builds");
    Fixture {
        authority,
        oracle,
        muse,
        scribe,
    }
}

pub fn with_adapter(adapter: Arc<dyn ModuleAdapter>) -> Authority {
    AuthorityBuilder::new(AuthorityConfig::default())
        .register_adapter(adapter)
        .build()
        .expect("authority builds")
}

pub fn oracle_request(session: &SessionId) -> CallRequest {
    CallRequest::new(
        session.clone(),
        CallerKind::Human,
        ModuleId::Oracle,
        "analyze",
        json!({"text": LONG_TEXT}),
    )
}

pub fn muse_request(session: &SessionId) -> CallRequest {
    CallRequest::new(
        session.clone(),
        CallerKind::Agent,
        ModuleId::Muse,
        "suggest",
        json!({"theme": "growth"}),
    )
    .with_seed(42)
}

pub fn scribe_request(session: &SessionId) -> CallRequest {
    CallRequest::new(
        session.clone(),
        CallerKind::System,
        ModuleId::Scribe,
        "render",
        json!({"context": {"title": "Q3"}}),
    )
}

pub fn is_hex64(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}
