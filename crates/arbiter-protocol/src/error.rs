//! Error types for the authority protocol.
//!
//! Call failures are values: every rejected or failed call carries a
//! [`CallError`] with a closed-set [`ErrorCode`]. Only the host-facing
//! failures in [`AuthorityError`] abort an operation outright.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Numeric range an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Guard,
    Execution,
    System,
}

/// Closed set of failure codes surfaced in responses and audit entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation: 1000-1999
    InvalidInput,
    MissingField,
    InvalidType,
    InvalidIdFormat,
    InvalidEnumValue,
    OutOfRange,
    InvalidVersionFormat,
    ActionNotAllowed,
    SeedRequired,
    InvalidPayloadShape,
    PayloadTooLarge,
    // Guard: 2000-2999
    ModuleWithoutPrerequisite,
    InsufficientContext,
    PayloadSizeExceeded,
    VersionIncompatible,
    CallerNotAllowed,
    SessionExpired,
    // Execution: 3000-3999
    RoutingFailed,
    ExecutionFailed,
    Timeout,
    ModuleError,
    ReplayMismatch,
    // System: 9000-9999
    ChronicleFull,
    ChronicleCorrupted,
    InvalidConfiguration,
    Internal,
}

impl ErrorCode {
    pub fn numeric(&self) -> u16 {
        match self {
            Self::InvalidInput => 1000,
            Self::MissingField => 1001,
            Self::InvalidType => 1002,
            Self::InvalidIdFormat => 1003,
            Self::InvalidEnumValue => 1004,
            Self::OutOfRange => 1005,
            Self::InvalidVersionFormat => 1006,
            Self::ActionNotAllowed => 1100,
            Self::SeedRequired => 1101,
            Self::InvalidPayloadShape => 1102,
            Self::PayloadTooLarge => 1103,
            Self::ModuleWithoutPrerequisite => 2001,
            Self::InsufficientContext => 2002,
            Self::PayloadSizeExceeded => 2003,
            Self::VersionIncompatible => 2004,
            Self::CallerNotAllowed => 2005,
            Self::SessionExpired => 2006,
            Self::RoutingFailed => 3001,
            Self::ExecutionFailed => 3002,
            Self::Timeout => 3003,
            Self::ModuleError => 3004,
            Self::ReplayMismatch => 3005,
            Self::ChronicleFull => 9001,
            Self::ChronicleCorrupted => 9002,
            Self::InvalidConfiguration => 9003,
            Self::Internal => 9999,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self.numeric() {
            1000..=1999 => ErrorCategory::Validation,
            2000..=2999 => ErrorCategory::Guard,
            3000..=3999 => ErrorCategory::Execution,
            _ => ErrorCategory::System,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::MissingField => "MISSING_FIELD",
            Self::InvalidType => "INVALID_TYPE",
            Self::InvalidIdFormat => "INVALID_ID_FORMAT",
            Self::InvalidEnumValue => "INVALID_ENUM_VALUE",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::InvalidVersionFormat => "INVALID_VERSION_FORMAT",
            Self::ActionNotAllowed => "ACTION_NOT_ALLOWED",
            Self::SeedRequired => "SEED_REQUIRED",
            Self::InvalidPayloadShape => "INVALID_PAYLOAD_SHAPE",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::ModuleWithoutPrerequisite => "MODULE_WITHOUT_PREREQUISITE",
            Self::InsufficientContext => "INSUFFICIENT_CONTEXT",
            Self::PayloadSizeExceeded => "PAYLOAD_SIZE_EXCEEDED",
            Self::VersionIncompatible => "VERSION_INCOMPATIBLE",
            Self::CallerNotAllowed => "CALLER_NOT_ALLOWED",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::RoutingFailed => "ROUTING_FAILED",
            Self::ExecutionFailed => "EXECUTION_FAILED",
            Self::Timeout => "TIMEOUT",
            Self::ModuleError => "MODULE_ERROR",
            Self::ReplayMismatch => "REPLAY_MISMATCH",
            Self::ChronicleFull => "CHRONICLE_FULL",
            Self::ChronicleCorrupted => "CHRONICLE_CORRUPTED",
            Self::InvalidConfiguration => "INVALID_CONFIGURATION",
            Self::Internal => "INTERNAL",
        }
    }

    /// Default recoverability when a code is raised without an explicit rule.
    pub fn default_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ModuleWithoutPrerequisite
                | Self::InsufficientContext
                | Self::SessionExpired
                | Self::Timeout
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure carried by a [`crate::CallResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct CallError {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl CallError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            recoverable: code.default_recoverable(),
            details: None,
            retry_after_ms: None,
        }
    }

    pub fn with_recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_retry_after_ms(mut self, retry_after_ms: u64) -> Self {
        self.retry_after_ms = Some(retry_after_ms);
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

/// Errors that abort an authority operation instead of becoming a response.
#[derive(Debug, Error)]
pub enum AuthorityError {
    #[error("chronicle capacity of {capacity} entries exceeded")]
    ChronicleFull { capacity: usize },
    #[error("chronicle corrupted at index {index}: {reason}")]
    ChronicleCorrupted { index: u64, reason: String },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("adapter registration failed: {0}")]
    Registration(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("io error: {0}")]
    Io(String),
}

impl AuthorityError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ChronicleFull { .. } => ErrorCode::ChronicleFull,
            Self::ChronicleCorrupted { .. } => ErrorCode::ChronicleCorrupted,
            Self::InvalidConfiguration(_) | Self::Registration(_) => {
                ErrorCode::InvalidConfiguration
            }
            Self::Serialization(_) | Self::Io(_) => ErrorCode::Internal,
        }
    }
}

impl From<serde_json::Error> for AuthorityError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<std::io::Error> for AuthorityError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

/// Convenience result type for authority operations.
pub type AuthorityResult<T> = Result<T, AuthorityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_fall_into_their_numeric_range() {
        assert_eq!(ErrorCode::InvalidIdFormat.category(), ErrorCategory::Validation);
        assert_eq!(
            ErrorCode::ModuleWithoutPrerequisite.category(),
            ErrorCategory::Guard
        );
        assert_eq!(ErrorCode::Timeout.category(), ErrorCategory::Execution);
        assert_eq!(ErrorCode::ChronicleFull.category(), ErrorCategory::System);
    }

    #[test]
    fn serde_name_matches_as_str() {
        for code in [
            ErrorCode::InvalidInput,
            ErrorCode::ModuleWithoutPrerequisite,
            ErrorCode::Timeout,
            ErrorCode::ChronicleCorrupted,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn guard_and_timeout_default_to_recoverable() {
        assert!(CallError::new(ErrorCode::Timeout, "slow").recoverable);
        assert!(CallError::new(ErrorCode::ModuleWithoutPrerequisite, "no").recoverable);
        assert!(!CallError::new(ErrorCode::InvalidIdFormat, "bad").recoverable);
        assert!(!CallError::new(ErrorCode::VersionIncompatible, "old").recoverable);
    }

    #[test]
    fn call_error_omits_empty_optionals() {
        let error = CallError::new(ErrorCode::ModuleError, "boom");
        let json = serde_json::to_value(&error).unwrap();
        assert!(json.get("details").is_none());
        assert!(json.get("retry_after_ms").is_none());
        assert_eq!(error.to_string(), "MODULE_ERROR: boom");
    }
}
