//! Call responses.

use crate::audit::AuditSummary;
use crate::error::CallError;
use crate::ids::{RequestId, ResponseId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Exactly one per call. Carries either a result or an error, never both,
/// and always an audit summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResponse {
    pub request_id: RequestId,
    pub response_id: ResponseId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CallError>,
    pub audit: AuditSummary,
}

impl CallResponse {
    pub fn succeeded(
        request_id: RequestId,
        response_id: ResponseId,
        result: Value,
        audit: AuditSummary,
    ) -> Self {
        Self {
            request_id,
            response_id,
            success: true,
            result: Some(result),
            error: None,
            audit,
        }
    }

    pub fn failed(
        request_id: RequestId,
        response_id: ResponseId,
        error: CallError,
        audit: AuditSummary,
    ) -> Self {
        Self {
            request_id,
            response_id,
            success: false,
            result: None,
            error: Some(error),
            audit,
        }
    }

    pub fn error_code(&self) -> Option<crate::ErrorCode> {
        self.error.as_ref().map(|error| error.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContentHash, ErrorCode};
    use chrono::Utc;
    use serde_json::json;

    fn summary() -> AuditSummary {
        AuditSummary {
            input_hash: ContentHash::from_hex("aa"),
            output_hash: ContentHash::from_hex("bb"),
            route: "ORACLE.analyze".to_owned(),
            duration_ms: 3,
            timestamp: Utc::now(),
            module_version: None,
        }
    }

    #[test]
    fn success_and_failure_are_exclusive() {
        let ok = CallResponse::succeeded(
            RequestId::new_uuid(),
            ResponseId::new_uuid(),
            json!({"ok": true}),
            summary(),
        );
        assert!(ok.success && ok.result.is_some() && ok.error.is_none());

        let failed = CallResponse::failed(
            RequestId::new_uuid(),
            ResponseId::new_uuid(),
            CallError::new(ErrorCode::Timeout, "late"),
            summary(),
        );
        assert!(!failed.success && failed.result.is_none());
        assert_eq!(failed.error_code(), Some(ErrorCode::Timeout));

        let json = serde_json::to_value(&failed).unwrap();
        assert!(json.get("result").is_none());
        assert_eq!(json["error"]["code"], "TIMEOUT");
    }
}
