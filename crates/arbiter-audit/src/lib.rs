//! Audit/Hash: canonical serialization, content hashing, and construction of
//! the audit records every call produces.
//!
//! Everything here is pure apart from the timestamp stamped on summaries.

pub mod canonical;
pub mod hasher;
pub mod record;

pub use canonical::{canonical_size, canonical_string, canonicalize};
pub use hasher::ContentHasher;
pub use record::{Auditor, CallIdentity};
