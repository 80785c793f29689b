//! Replay: rebuild a call from its chronicle entry, run it again through the
//! live routing and execution path, and compare output hashes.
//!
//! Payloads are stored only as hashes, so a plain replay runs with an empty
//! payload object; [`ReplayEngine::replay_with_payload`] takes the original
//! payload explicitly. The seed and the requested deadline are restored from
//! the entry.

mod report;

use std::borrow::Borrow;

use arbiter_audit::Auditor;
use arbiter_executor::ModuleExecutor;
use arbiter_protocol::{CallError, CallRequest, CallerKind, ChronicleEntry, ContentHash};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

pub use report::{BatchReport, HASH_PREFIX_LEN, ReplayDiff, ReplayOutcome};

#[derive(Debug, Clone)]
pub struct ReplayEngine {
    executor: ModuleExecutor,
    auditor: Auditor,
}

impl ReplayEngine {
    /// `auditor` must hash with the same algorithm the chronicle was built with.
    pub fn new(executor: ModuleExecutor, auditor: Auditor) -> Self {
        Self { executor, auditor }
    }

    pub async fn replay(&self, entry: &ChronicleEntry) -> ReplayOutcome {
        self.replay_with_payload(entry, Value::Object(Map::new())).await
    }

    #[instrument(
        skip(self, entry, payload),
        fields(index = entry.index, route = %entry.entry.summary.route)
    )]
    pub async fn replay_with_payload(
        &self,
        entry: &ChronicleEntry,
        payload: Value,
    ) -> ReplayOutcome {
        let original_hash = entry.entry.summary.output_hash.clone();
        let decision = match self.executor.router().route_str(entry.entry.route()) {
            Ok(decision) => decision,
            Err(error) => {
                let replayed_hash = self.auditor.hash_outcome(Err(&error));
                return self.compare(entry, original_hash, replayed_hash, Some(error));
            }
        };

        let request = CallRequest {
            request_id: entry.entry.request_id.clone(),
            session_id: entry.entry.session_id.clone(),
            caller: entry.entry.caller.unwrap_or(CallerKind::System),
            module: decision.module,
            action: decision.action.clone(),
            payload,
            seed: entry.entry.seed,
            timeout_ms: entry.entry.timeout_ms,
            version: None,
        };
        let execution = self.executor.execute(&decision, &request).await;
        let replayed_hash = self.auditor.hash_outcome(execution.outcome.as_ref());
        self.compare(entry, original_hash, replayed_hash, execution.outcome.err())
    }

    /// Replays `entries` in order. With `stop_on_mismatch`, stops after the
    /// first mismatch and marks the report `stopped_early` if entries remain.
    pub async fn replay_batch<E>(&self, entries: &[E], stop_on_mismatch: bool) -> BatchReport
    where
        E: Borrow<ChronicleEntry>,
    {
        let mut report = BatchReport::default();
        for (position, entry) in entries.iter().enumerate() {
            let entry: &ChronicleEntry = entry.borrow();
            let outcome = self.replay(entry).await;
            let matched = outcome.matched;
            report.push(outcome);
            if !matched && stop_on_mismatch {
                report.stopped_early = position + 1 < entries.len();
                break;
            }
        }
        report.all_matched = report.mismatched == 0 && !report.stopped_early;
        debug!(
            replayed = report.replayed,
            mismatched = report.mismatched,
            "replay batch finished"
        );
        report
    }

    fn compare(
        &self,
        entry: &ChronicleEntry,
        original_hash: ContentHash,
        replayed_hash: ContentHash,
        error: Option<CallError>,
    ) -> ReplayOutcome {
        let matched = original_hash == replayed_hash;
        let diff = if matched {
            None
        } else {
            let diff = ReplayDiff::output_hash(&original_hash, &replayed_hash);
            warn!(diff = %diff.description, "replay diverged");
            Some(diff)
        };
        ReplayOutcome {
            index: entry.index,
            route: entry.entry.route().to_owned(),
            original_hash,
            replayed_hash,
            matched,
            diff,
            error,
        }
    }
}
