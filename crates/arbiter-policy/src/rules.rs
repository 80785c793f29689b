use arbiter_protocol::{CallError, ErrorCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// The six precondition rules. Declaration order is evaluation order and is
/// part of the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardRule {
    Prerequisite,
    SemanticContext,
    PayloadSize,
    VersionCompatibility,
    CallerAllowed,
    SessionActive,
}

impl GuardRule {
    pub const ORDERED: [GuardRule; 6] = [
        GuardRule::Prerequisite,
        GuardRule::SemanticContext,
        GuardRule::PayloadSize,
        GuardRule::VersionCompatibility,
        GuardRule::CallerAllowed,
        GuardRule::SessionActive,
    ];

    /// 1-based position in the evaluation order.
    pub fn ordinal(&self) -> usize {
        match self {
            Self::Prerequisite => 1,
            Self::SemanticContext => 2,
            Self::PayloadSize => 3,
            Self::VersionCompatibility => 4,
            Self::CallerAllowed => 5,
            Self::SessionActive => 6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Prerequisite => "prerequisite",
            Self::SemanticContext => "semantic_context",
            Self::PayloadSize => "payload_size",
            Self::VersionCompatibility => "version_compatibility",
            Self::CallerAllowed => "caller_allowed",
            Self::SessionActive => "session_active",
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Prerequisite => ErrorCode::ModuleWithoutPrerequisite,
            Self::SemanticContext => ErrorCode::InsufficientContext,
            Self::PayloadSize => ErrorCode::PayloadSizeExceeded,
            Self::VersionCompatibility => ErrorCode::VersionIncompatible,
            Self::CallerAllowed => ErrorCode::CallerNotAllowed,
            Self::SessionActive => ErrorCode::SessionExpired,
        }
    }

    /// Fixable preconditions are recoverable; structural mismatches are not.
    pub fn recoverable(&self) -> bool {
        matches!(
            self,
            Self::Prerequisite | Self::SemanticContext | Self::SessionActive
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardViolation {
    pub rule: GuardRule,
    pub message: String,
}

impl GuardViolation {
    pub fn new(rule: GuardRule, message: impl Into<String>) -> Self {
        Self {
            rule,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.rule.code()
    }

    pub fn to_call_error(&self) -> CallError {
        CallError::new(self.rule.code(), self.message.clone())
            .with_recoverable(self.rule.recoverable())
            .with_details(json!({
                "rule": self.rule.name(),
                "ordinal": self.rule.ordinal(),
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_matches_ordinals() {
        for (position, rule) in GuardRule::ORDERED.iter().enumerate() {
            assert_eq!(rule.ordinal(), position + 1);
        }
        assert!(GuardRule::Prerequisite < GuardRule::CallerAllowed);
    }

    #[test]
    fn violation_carries_rule_recoverability() {
        let error =
            GuardViolation::new(GuardRule::Prerequisite, "run ORACLE first").to_call_error();
        assert_eq!(error.code, ErrorCode::ModuleWithoutPrerequisite);
        assert!(error.recoverable);
        assert_eq!(error.details.unwrap()["ordinal"], 1);

        let error = GuardViolation::new(GuardRule::VersionCompatibility, "too old").to_call_error();
        assert!(!error.recoverable);
    }
}
