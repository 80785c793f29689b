//! The chronicle: an append-only, capacity-bounded, hash-linked log of every
//! call's audit entry.
//!
//! Entry `i` stores the hash of entry `i - 1` and its own hash over
//! `{index, entry, prev_hash}`, so any post-hoc edit is caught by
//! [`Chronicle::verify`] at the edited index. Stored entries are shared as
//! `Arc`s and never handed out mutably.

mod chain;
mod export;

use std::path::Path;
use std::sync::Arc;

use arbiter_audit::ContentHasher;
use arbiter_protocol::{
    AuditEntry, AuthorityConfig, AuthorityError, AuthorityResult, ChronicleEntry, ContentHash,
    RequestId, SessionId,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, instrument, warn};

pub use chain::{entry_hash, verify_chain};

const STREAM_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChronicleStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// `succeeded / total`, 0.0 when empty.
    pub success_rate: f64,
    pub mean_duration_ms: f64,
}

#[derive(Debug)]
pub struct Chronicle {
    entries: RwLock<Vec<Arc<ChronicleEntry>>>,
    capacity: usize,
    hasher: ContentHasher,
    sender: broadcast::Sender<Arc<ChronicleEntry>>,
}

impl Chronicle {
    pub fn new(capacity: usize, hasher: ContentHasher) -> Self {
        let (sender, _) = broadcast::channel(STREAM_BUFFER);
        Self {
            entries: RwLock::new(Vec::new()),
            capacity,
            hasher,
            sender,
        }
    }

    pub fn from_config(config: &AuthorityConfig) -> Self {
        Self::new(
            config.max_chronicle_entries,
            ContentHasher::new(config.hash_algorithm),
        )
    }

    /// Rebuilds a chronicle from previously exported entries, rejecting any
    /// sequence that fails verification or exceeds `capacity`.
    pub fn from_entries(
        entries: Vec<ChronicleEntry>,
        capacity: usize,
        hasher: ContentHasher,
    ) -> AuthorityResult<Self> {
        if entries.len() > capacity {
            return Err(AuthorityError::ChronicleFull { capacity });
        }
        if let Err(error) = verify_chain(&entries, &hasher) {
            warn!(error = %error, "rejecting chronicle import");
            return Err(error);
        }
        let chronicle = Self::new(capacity, hasher);
        *chronicle.entries.write() = entries.into_iter().map(Arc::new).collect();
        Ok(chronicle)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn hasher(&self) -> ContentHasher {
        self.hasher
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Links `entry` onto the tail. Fails, leaving the chronicle unchanged,
    /// once `capacity` entries are stored.
    #[instrument(
        skip(self, entry),
        fields(
            request_id = %entry.request_id,
            route = %entry.summary.route,
            success = entry.success
        )
    )]
    pub fn append(&self, entry: AuditEntry) -> AuthorityResult<Arc<ChronicleEntry>> {
        let mut entries = self.entries.write();
        if entries.len() >= self.capacity {
            warn!(capacity = self.capacity, "chronicle is full");
            return Err(AuthorityError::ChronicleFull {
                capacity: self.capacity,
            });
        }
        let linked = Arc::new(chain::link(
            &self.hasher,
            entries.last().map(|tail| &**tail),
            entry,
        )?);
        entries.push(linked.clone());
        drop(entries);

        debug!(
            index = linked.index,
            entry_hash = %linked.entry_hash.prefix(12),
            "chronicle entry appended"
        );
        let _ = self.sender.send(linked.clone());
        Ok(linked)
    }

    /// Checks the whole chain; the error names the first broken index.
    pub fn verify(&self) -> AuthorityResult<()> {
        let entries = self.entries.read();
        verify_chain(entries.as_slice(), &self.hasher)
    }

    /// Hash of the last entry, empty when nothing was appended.
    pub fn tail_hash(&self) -> ContentHash {
        self.entries
            .read()
            .last()
            .map(|tail| tail.entry_hash.clone())
            .unwrap_or_default()
    }

    pub fn entries(&self) -> Vec<Arc<ChronicleEntry>> {
        self.entries.read().clone()
    }

    pub fn get(&self, index: u64) -> Option<Arc<ChronicleEntry>> {
        let position = usize::try_from(index).ok()?;
        self.entries.read().get(position).cloned()
    }

    pub fn latest(&self) -> Option<Arc<ChronicleEntry>> {
        self.entries.read().last().cloned()
    }

    pub fn find_by_request(&self, request_id: &RequestId) -> Option<Arc<ChronicleEntry>> {
        self.entries
            .read()
            .iter()
            .find(|entry| entry.entry.request_id == *request_id)
            .cloned()
    }

    pub fn by_session(&self, session_id: &SessionId) -> Vec<Arc<ChronicleEntry>> {
        self.filter(|entry| entry.entry.session_id == *session_id)
    }

    pub fn by_route(&self, route: &str) -> Vec<Arc<ChronicleEntry>> {
        self.filter(|entry| entry.entry.route() == route)
    }

    /// Entries stamped within `[from, to]`.
    pub fn in_time_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<Arc<ChronicleEntry>> {
        self.filter(|entry| {
            let at = entry.entry.summary.timestamp;
            at >= from && at <= to
        })
    }

    pub fn stats(&self) -> ChronicleStats {
        let entries = self.entries.read();
        let total = entries.len();
        let succeeded = entries.iter().filter(|entry| entry.entry.success).count();
        let duration_sum: f64 = entries
            .iter()
            .map(|entry| entry.entry.summary.duration_ms as f64)
            .sum();
        let (success_rate, mean_duration_ms) = if total == 0 {
            (0.0, 0.0)
        } else {
            (
                succeeded as f64 / total as f64,
                duration_sum / total as f64,
            )
        };
        ChronicleStats {
            total,
            succeeded,
            failed: total - succeeded,
            success_rate,
            mean_duration_ms,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ChronicleEntry>> {
        self.sender.subscribe()
    }

    pub fn subscribe_stream(&self) -> BroadcastStream<Arc<ChronicleEntry>> {
        BroadcastStream::new(self.sender.subscribe())
    }

    pub fn export_jsonl(&self) -> AuthorityResult<String> {
        let entries = self.entries();
        export::to_jsonl(&entries)
    }

    pub fn import_jsonl(
        text: &str,
        capacity: usize,
        hasher: ContentHasher,
    ) -> AuthorityResult<Self> {
        Self::from_entries(export::from_jsonl(text)?, capacity, hasher)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn export_to_file(&self, path: &Path) -> AuthorityResult<usize> {
        let entries = self.entries();
        export::write_file(path, &entries).await?;
        debug!(count = entries.len(), "chronicle exported");
        Ok(entries.len())
    }

    #[instrument(skip(hasher), fields(path = %path.display()))]
    pub async fn import_from_file(
        path: &Path,
        capacity: usize,
        hasher: ContentHasher,
    ) -> AuthorityResult<Self> {
        let entries = export::read_file(path).await?;
        let count = entries.len();
        let chronicle = Self::from_entries(entries, capacity, hasher)?;
        debug!(count, "chronicle imported");
        Ok(chronicle)
    }

    fn filter(&self, keep: impl Fn(&ChronicleEntry) -> bool) -> Vec<Arc<ChronicleEntry>> {
        self.entries
            .read()
            .iter()
            .filter(|entry| keep(entry))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use anyhow::Result;
    use arbiter_audit::{Auditor, CallIdentity};
    use arbiter_protocol::{
        CallError, CallRequest, CallerKind, ErrorCode, HashAlgorithm, ModuleId, ResponseId,
    };
    use serde_json::json;
    use tokio::fs;

    use super::*;

    fn unique_test_root(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("{name}-{nanos}"))
    }

    fn audit_entry(session: &SessionId, action: &str, failed: bool) -> AuditEntry {
        let auditor = Auditor::default();
        let request = CallRequest::new(
            session.clone(),
            CallerKind::Human,
            ModuleId::Oracle,
            action,
            json!({"text": "chronicle test"}),
        );
        let error = CallError::new(ErrorCode::ModuleError, "boom");
        let result = json!({"ok": true});
        let outcome = if failed { Err(&error) } else { Ok(&result) };
        let summary = auditor.summarize(
            &serde_json::to_value(&request).unwrap_or_default(),
            outcome,
            request.route(),
            Duration::from_millis(if failed { 30 } else { 10 }),
            None,
        );
        auditor.entry(
            summary,
            CallIdentity::from(&request),
            ResponseId::new_uuid(),
            failed.then_some(&error),
        )
    }

    fn filled(count: usize) -> (Chronicle, SessionId) {
        let chronicle = Chronicle::new(100, ContentHasher::sha256());
        let session = SessionId::new_uuid();
        for n in 0..count {
            chronicle
                .append(audit_entry(&session, "analyze", n % 3 == 2))
                .unwrap();
        }
        (chronicle, session)
    }

    #[test]
    fn sequential_appends_link_and_verify() {
        let (chronicle, _) = filled(5);
        chronicle.verify().unwrap();

        let entries = chronicle.entries();
        assert!(entries[0].prev_hash.is_empty());
        for pair in entries.windows(2) {
            assert_eq!(pair[1].prev_hash, pair[0].entry_hash);
            assert_eq!(pair[1].index, pair[0].index + 1);
        }
        assert_eq!(chronicle.tail_hash(), entries[4].entry_hash);
    }

    #[test]
    fn tampering_is_caught_at_the_edited_index() {
        let (chronicle, _) = filled(4);
        let hasher = chronicle.hasher();
        let mut entries: Vec<ChronicleEntry> =
            chronicle.entries().iter().map(|entry| (**entry).clone()).collect();

        let mut tampered = entries.clone();
        tampered[2].entry_hash = ContentHash::from_hex("0".repeat(64));
        match verify_chain(&tampered, &hasher) {
            Err(AuthorityError::ChronicleCorrupted { index, .. }) => assert_eq!(index, 2),
            other => panic!("unexpected verification result: {other:?}"),
        }

        entries[1].entry.success = !entries[1].entry.success;
        match verify_chain(&entries, &hasher) {
            Err(AuthorityError::ChronicleCorrupted { index, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected verification result: {other:?}"),
        }
    }

    #[test]
    fn capacity_overflow_fails_loudly() {
        let chronicle = Chronicle::new(2, ContentHasher::sha256());
        let session = SessionId::new_uuid();
        chronicle.append(audit_entry(&session, "analyze", false)).unwrap();
        chronicle.append(audit_entry(&session, "analyze", false)).unwrap();
        let error = chronicle
            .append(audit_entry(&session, "analyze", false))
            .unwrap_err();
        assert_eq!(error.code(), ErrorCode::ChronicleFull);
        assert_eq!(chronicle.len(), 2);
        chronicle.verify().unwrap();
    }

    #[test]
    fn lookups_and_stats() {
        let (chronicle, session) = filled(6);
        let other = SessionId::new_uuid();
        let classified = chronicle.append(audit_entry(&other, "classify", false)).unwrap();

        assert_eq!(chronicle.by_session(&session).len(), 6);
        assert_eq!(chronicle.by_route("ORACLE.classify").len(), 1);
        assert_eq!(
            chronicle
                .find_by_request(&classified.entry.request_id)
                .map(|entry| entry.index),
            Some(6)
        );
        assert_eq!(chronicle.get(6).unwrap().entry_hash, classified.entry_hash);
        assert!(chronicle.get(7).is_none());

        let first = chronicle.get(0).unwrap().entry.summary.timestamp;
        let all = chronicle.in_time_range(first, Utc::now());
        assert_eq!(all.len(), 7);

        let stats = chronicle.stats();
        assert_eq!(stats.total, 7);
        assert_eq!(stats.failed, 2);
        assert!((stats.success_rate - 5.0 / 7.0).abs() < 1e-9);
        assert!((stats.mean_duration_ms - 110.0 / 7.0).abs() < 1e-9);

        let empty = Chronicle::new(1, ContentHasher::sha256()).stats();
        assert_eq!(empty.success_rate, 0.0);
    }

    #[test]
    fn jsonl_round_trips_through_verify() {
        let (chronicle, _) = filled(3);
        let text = chronicle.export_jsonl().unwrap();
        assert_eq!(text.lines().count(), 3);

        let imported = Chronicle::import_jsonl(&text, 10, chronicle.hasher()).unwrap();
        imported.verify().unwrap();
        assert_eq!(imported.tail_hash(), chronicle.tail_hash());

        let next = imported
            .append(audit_entry(&SessionId::new_uuid(), "summarize", false))
            .unwrap();
        assert_eq!(next.index, 3);
        assert_eq!(next.prev_hash, chronicle.tail_hash());
    }

    #[test]
    fn import_rejects_broken_chains() {
        let (chronicle, _) = filled(3);
        let mut lines: Vec<String> = chronicle
            .export_jsonl()
            .unwrap()
            .lines()
            .map(ToOwned::to_owned)
            .collect();
        lines.remove(1);
        let error = Chronicle::import_jsonl(&lines.join("\n"), 10, chronicle.hasher())
            .unwrap_err();
        assert_eq!(error.code(), ErrorCode::ChronicleCorrupted);

        let text = chronicle.export_jsonl().unwrap();
        let fnv = ContentHasher::new(HashAlgorithm::Fnv1a);
        assert!(Chronicle::import_jsonl(&text, 10, fnv).is_err());
        assert!(Chronicle::import_jsonl(&text, 2, chronicle.hasher()).is_err());
    }

    #[tokio::test]
    async fn subscribers_see_appends_in_order() {
        let chronicle = Chronicle::new(10, ContentHasher::sha256());
        let mut receiver = chronicle.subscribe();
        let session = SessionId::new_uuid();
        chronicle.append(audit_entry(&session, "analyze", false)).unwrap();
        chronicle.append(audit_entry(&session, "classify", true)).unwrap();

        assert_eq!(receiver.recv().await.unwrap().index, 0);
        let second = receiver.recv().await.unwrap();
        assert_eq!(second.index, 1);
        assert!(!second.entry.success);
    }

    #[tokio::test]
    async fn file_export_round_trips() -> Result<()> {
        let root = unique_test_root("arbiter-chronicle");
        let path = root.join("chronicle.jsonl");
        let (chronicle, _) = filled(4);

        assert_eq!(chronicle.export_to_file(&path).await?, 4);
        let imported = Chronicle::import_from_file(&path, 10, chronicle.hasher()).await?;
        assert_eq!(imported.len(), 4);
        assert_eq!(imported.tail_hash(), chronicle.tail_hash());

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }
}
