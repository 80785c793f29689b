//! Audit records: the per-call summary, the full audit entry, and the
//! hash-linked chronicle entry wrapping it.

use crate::error::ErrorCode;
use crate::ids::{ContentHash, RequestId, ResponseId, SessionId};
use crate::module::CallerKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Present in every response, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub input_hash: ContentHash,
    pub output_hash: ContentHash,
    /// `MODULE.action`
    pub route: String,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_version: Option<String>,
}

/// One per call; immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub summary: AuditSummary,
    pub request_id: RequestId,
    pub response_id: ResponseId,
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller: Option<CallerKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Deadline the caller asked for, so replay can run under the same one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
}

impl AuditEntry {
    pub fn route(&self) -> &str {
        &self.summary.route
    }
}

/// An [`AuditEntry`] linked into the chronicle.
///
/// `entry_hash` is computed over `{index, entry, prev_hash}`; `prev_hash` is
/// the `entry_hash` of the preceding entry, empty at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChronicleEntry {
    pub index: u64,
    pub entry: AuditEntry,
    pub prev_hash: ContentHash,
    pub entry_hash: ContentHash,
}
