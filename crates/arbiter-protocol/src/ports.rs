//! The adapter port: the only contract the authority expects from a
//! downstream module implementation.
//!
//! Object-safety note:
//! - The trait uses `async-trait` for async dyn-dispatch; adapters are held
//!   as `Arc<dyn ModuleAdapter>` and invoked on a detached task.

use crate::ids::AdapterId;
use crate::module::{ModuleId, SemVer};
use async_trait::async_trait;
use serde_json::Value;

/// Opaque executor of one module's real behavior.
#[async_trait]
pub trait ModuleAdapter: Send + Sync + 'static {
    /// Fixed id this adapter registers against.
    fn id(&self) -> AdapterId;

    fn module(&self) -> ModuleId;

    fn version(&self) -> SemVer;

    /// Runs `action` over `payload`. Any error is reported as a module error
    /// with its message preserved.
    async fn invoke(
        &self,
        action: &str,
        payload: &Value,
        seed: Option<u64>,
    ) -> anyhow::Result<Value>;
}
