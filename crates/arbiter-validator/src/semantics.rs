//! Layer 3: cross-field rules a schema cannot express.

use arbiter_audit::canonical_size;
use arbiter_protocol::{CallRequest, ErrorCode, MAX_PAYLOAD_BYTES, ModuleId};
use serde_json::Value;

use crate::report::{ValidationIssue, ValidationLayer};

pub(crate) fn check(request: &CallRequest) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let module = request.module;

    if !module.allows_action(&request.action) {
        issues.push(issue(
            "action",
            ErrorCode::ActionNotAllowed,
            format!(
                "action `{}` not allowed for {module}, valid actions: {}",
                request.action,
                module.allowed_actions().join(", ")
            ),
        ));
    }

    if module.requires_seed() && request.seed.is_none() {
        issues.push(issue(
            "seed",
            ErrorCode::SeedRequired,
            format!("{module} requires a seed"),
        ));
    }

    check_payload_shape(module, &request.payload, &mut issues);

    let size = canonical_size(&request.payload);
    if size > MAX_PAYLOAD_BYTES {
        issues.push(issue(
            "payload",
            ErrorCode::PayloadTooLarge,
            format!("payload is {size} bytes, ceiling is {MAX_PAYLOAD_BYTES}"),
        ));
    }

    issues
}

fn check_payload_shape(module: ModuleId, payload: &Value, issues: &mut Vec<ValidationIssue>) {
    match module {
        ModuleId::Oracle => match payload.get("text") {
            Some(Value::String(_)) => {}
            Some(_) => issues.push(issue(
                "payload.text",
                ErrorCode::InvalidPayloadShape,
                "text must be a string",
            )),
            None => issues.push(issue(
                "payload.text",
                ErrorCode::InvalidPayloadShape,
                "ORACLE requires a text field",
            )),
        },
        ModuleId::Scribe => {
            let has_context = match payload.get("context") {
                Some(Value::String(text)) => !text.trim().is_empty(),
                Some(Value::Object(fields)) => !fields.is_empty(),
                _ => false,
            };
            if !has_context {
                issues.push(issue(
                    "payload.context",
                    ErrorCode::InvalidPayloadShape,
                    "SCRIBE requires a non-empty context string or object",
                ));
            }
        }
        ModuleId::Muse => {}
    }
}

fn issue(path: &str, code: ErrorCode, message: impl Into<String>) -> ValidationIssue {
    ValidationIssue::new(ValidationLayer::Semantics, path, code, message)
}
