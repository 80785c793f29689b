//! # arbiter-protocol — shared contract of the arbiter authority
//!
//! This crate defines the types every other arbiter crate agrees on: what a
//! call looks like, what comes back, how failures are coded, what gets
//! audited, and the one trait downstream module adapters implement.
//!
//! It is intentionally runtime-free (no tokio) so it can be used as a pure
//! contract crate.
//!
//! ## Module Overview
//!
//! - [`ids`] — Typed ID wrappers (RequestId, SessionId, ResponseId, AdapterId, ContentHash)
//! - [`module`] — ModuleId, CallerKind, SemVer closed sets
//! - [`request`] — CallRequest, CallInput
//! - [`response`] — CallResponse
//! - [`audit`] — AuditSummary, AuditEntry, ChronicleEntry
//! - [`config`] — AuthorityConfig, HashAlgorithm
//! - [`ports`] — ModuleAdapter
//! - [`error`] — ErrorCode, CallError, AuthorityError

pub mod audit;
pub mod config;
pub mod error;
pub mod ids;
pub mod module;
pub mod ports;
pub mod request;
pub mod response;

// Re-export the most commonly used types at the crate root.
pub use audit::{AuditEntry, AuditSummary, ChronicleEntry};
pub use config::{AuthorityConfig, HashAlgorithm, MAX_PAYLOAD_BYTES};
pub use error::{AuthorityError, AuthorityResult, CallError, ErrorCategory, ErrorCode};
pub use ids::{AdapterId, ContentHash, RequestId, ResponseId, SessionId, is_uuid_shaped};
pub use module::{CallerKind, InvalidVersion, ModuleId, SemVer, UnknownVariant};
pub use ports::ModuleAdapter;
pub use request::{CallInput, CallRequest, InputIdentity};
pub use response::CallResponse;
