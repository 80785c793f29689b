//! Hash linkage between chronicle entries.

use std::borrow::Borrow;

use arbiter_audit::ContentHasher;
use arbiter_protocol::{AuditEntry, AuthorityError, AuthorityResult, ChronicleEntry, ContentHash};
use serde::Serialize;

/// The fields an entry hash covers.
#[derive(Serialize)]
struct Linked<'a> {
    index: u64,
    entry: &'a AuditEntry,
    prev_hash: &'a ContentHash,
}

pub fn entry_hash(
    hasher: &ContentHasher,
    index: u64,
    entry: &AuditEntry,
    prev_hash: &ContentHash,
) -> AuthorityResult<ContentHash> {
    hasher.hash_serializable(&Linked {
        index,
        entry,
        prev_hash,
    })
}

/// Links `entry` after `tail`, or at index 0 when the chain is empty.
pub fn link(
    hasher: &ContentHasher,
    tail: Option<&ChronicleEntry>,
    entry: AuditEntry,
) -> AuthorityResult<ChronicleEntry> {
    let (index, prev_hash) = match tail {
        Some(tail) => (tail.index + 1, tail.entry_hash.clone()),
        None => (0, ContentHash::empty()),
    };
    let entry_hash = entry_hash(hasher, index, &entry, &prev_hash)?;
    Ok(ChronicleEntry {
        index,
        entry,
        prev_hash,
        entry_hash,
    })
}

/// Walks `entries` checking index continuity, `prev_hash` linkage and every
/// recomputed `entry_hash`. Fails with the first broken index.
pub fn verify_chain<E>(entries: &[E], hasher: &ContentHasher) -> AuthorityResult<()>
where
    E: Borrow<ChronicleEntry>,
{
    let mut expected_prev = ContentHash::empty();
    for (expected_index, entry) in (0_u64..).zip(entries) {
        let entry: &ChronicleEntry = entry.borrow();
        if entry.index != expected_index {
            return Err(corrupted(
                expected_index,
                format!("index {} found where {expected_index} was expected", entry.index),
            ));
        }
        if entry.prev_hash != expected_prev {
            return Err(corrupted(
                expected_index,
                format!(
                    "prev_hash {} does not match preceding entry hash {}",
                    entry.prev_hash.prefix(12),
                    expected_prev.prefix(12)
                ),
            ));
        }
        let recomputed = entry_hash(hasher, entry.index, &entry.entry, &entry.prev_hash)?;
        if recomputed != entry.entry_hash {
            return Err(corrupted(
                expected_index,
                format!(
                    "stored entry_hash {} differs from recomputed {}",
                    entry.entry_hash.prefix(12),
                    recomputed.prefix(12)
                ),
            ));
        }
        expected_prev = entry.entry_hash.clone();
    }
    Ok(())
}

fn corrupted(index: u64, reason: String) -> AuthorityError {
    AuthorityError::ChronicleCorrupted { index, reason }
}
