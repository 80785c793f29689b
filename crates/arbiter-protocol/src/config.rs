//! Injected configuration surface of the authority.

use crate::error::{AuthorityError, AuthorityResult};
use crate::module::{CallerKind, ModuleId, SemVer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 2 MiB, the payload ceiling applied by semantic validation and the
/// default for the guard's independently configured ceiling.
pub const MAX_PAYLOAD_BYTES: usize = 2 * 1024 * 1024;

/// Digest used for every hash of one authority instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    /// Fast non-cryptographic placeholder for environments without SHA-256.
    Fnv1a,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    pub max_chronicle_entries: usize,
    pub default_timeout_ms: u64,
    pub max_payload_bytes: usize,
    pub allowed_callers: Vec<CallerKind>,
    pub module_versions: BTreeMap<ModuleId, String>,
    pub session_ttl_secs: u64,
    pub hash_algorithm: HashAlgorithm,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            max_chronicle_entries: 10_000,
            default_timeout_ms: 30_000,
            max_payload_bytes: MAX_PAYLOAD_BYTES,
            allowed_callers: CallerKind::ALL.to_vec(),
            module_versions: BTreeMap::from([
                (ModuleId::Oracle, "1.2.0".to_owned()),
                (ModuleId::Muse, "1.0.3".to_owned()),
                (ModuleId::Scribe, "0.9.1".to_owned()),
            ]),
            session_ttl_secs: 3_600,
            hash_algorithm: HashAlgorithm::Sha256,
        }
    }
}

impl AuthorityConfig {
    pub fn from_json_str(raw: &str) -> AuthorityResult<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|error| AuthorityError::InvalidConfiguration(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Malformed configuration is one of the two failures allowed to abort.
    pub fn validate(&self) -> AuthorityResult<()> {
        if self.max_chronicle_entries == 0 {
            return Err(invalid("max_chronicle_entries must be greater than zero"));
        }
        if self.default_timeout_ms == 0 {
            return Err(invalid("default_timeout_ms must be greater than zero"));
        }
        if self.max_payload_bytes == 0 {
            return Err(invalid("max_payload_bytes must be greater than zero"));
        }
        if self.allowed_callers.is_empty() {
            return Err(invalid("allowed_callers must not be empty"));
        }
        for module in ModuleId::ALL {
            let raw = self
                .module_versions
                .get(&module)
                .ok_or_else(|| invalid(format!("module_versions is missing {module}")))?;
            raw.parse::<SemVer>()
                .map_err(|error| invalid(format!("module_versions.{module}: {error}")))?;
        }
        Ok(())
    }

    /// Parsed available version of `module`, if configured and well formed.
    pub fn available_version(&self, module: ModuleId) -> Option<SemVer> {
        self.module_versions
            .get(&module)
            .and_then(|raw| raw.parse().ok())
    }
}

fn invalid(message: impl Into<String>) -> AuthorityError {
    AuthorityError::InvalidConfiguration(message.into())
}
