use arbiter_protocol::{CallError, ContentHash, ErrorCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Hex characters shown when describing a hash.
pub const HASH_PREFIX_LEN: usize = 12;

/// Why a replayed output did not match the chronicled one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayDiff {
    pub field: String,
    pub expected: String,
    pub actual: String,
    pub description: String,
}

impl ReplayDiff {
    pub fn output_hash(expected: &ContentHash, actual: &ContentHash) -> Self {
        let expected = expected.prefix(HASH_PREFIX_LEN).to_owned();
        let actual = actual.prefix(HASH_PREFIX_LEN).to_owned();
        Self {
            field: "output_hash".to_owned(),
            description: format!("output hash {expected}.. was replayed as {actual}.."),
            expected,
            actual,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayOutcome {
    pub index: u64,
    pub route: String,
    pub original_hash: ContentHash,
    pub replayed_hash: ContentHash,
    pub matched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<ReplayDiff>,
    /// Error the replayed execution produced, if any. A replayed error can
    /// still match when the original call failed the same way.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CallError>,
}

impl ReplayOutcome {
    /// `REPLAY_MISMATCH` describing the diff, for mismatched outcomes.
    pub fn mismatch_error(&self) -> Option<CallError> {
        let diff = self.diff.as_ref()?;
        Some(
            CallError::new(
                ErrorCode::ReplayMismatch,
                format!("replay of entry {} diverged: {}", self.index, diff.description),
            )
            .with_recoverable(false)
            .with_details(json!({
                "index": self.index,
                "route": self.route,
                "field": diff.field,
                "expected": diff.expected,
                "actual": diff.actual,
            })),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<ReplayOutcome>,
    pub replayed: usize,
    pub matched: usize,
    pub mismatched: usize,
    pub all_matched: bool,
    pub stopped_early: bool,
}

impl BatchReport {
    pub(crate) fn push(&mut self, outcome: ReplayOutcome) {
        self.replayed += 1;
        if outcome.matched {
            self.matched += 1;
        } else {
            self.mismatched += 1;
        }
        self.outcomes.push(outcome);
    }

    pub fn first_mismatch(&self) -> Option<&ReplayOutcome> {
        self.outcomes.iter().find(|outcome| !outcome.matched)
    }
}
