//! Layer 2: required fields, types, id shapes, closed sets, numeric bounds
//! and version format.

use arbiter_protocol::{CallerKind, ErrorCode, ModuleId, SemVer, is_uuid_shaped};
use serde_json::{Map, Value};

use crate::report::{ValidationIssue, ValidationLayer};

pub const MAX_ACTION_LEN: usize = 32;
pub const MAX_SEED: u64 = u32::MAX as u64;
pub const MIN_TIMEOUT_MS: u64 = 1;
pub const MAX_TIMEOUT_MS: u64 = 300_000;

pub(crate) fn check(object: &Map<String, Value>) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for field in ["request_id", "session_id"] {
        if let Some(value) = required_str(object, field, &mut issues)
            && !is_uuid_shaped(value)
        {
            issues.push(issue(
                field,
                ErrorCode::InvalidIdFormat,
                format!("`{value}` is not a hyphenated UUID"),
            ));
        }
    }

    if let Some(value) = required_str(object, "caller", &mut issues)
        && let Err(error) = value.parse::<CallerKind>()
    {
        issues.push(issue("caller", ErrorCode::InvalidEnumValue, error.to_string()));
    }

    if let Some(value) = required_str(object, "module", &mut issues)
        && let Err(error) = value.parse::<ModuleId>()
    {
        issues.push(issue("module", ErrorCode::InvalidEnumValue, error.to_string()));
    }

    if let Some(action) = required_str(object, "action", &mut issues) {
        let len = action.chars().count();
        if len == 0 || len > MAX_ACTION_LEN {
            issues.push(issue(
                "action",
                ErrorCode::OutOfRange,
                format!("action length {len} outside 1..={MAX_ACTION_LEN}"),
            ));
        } else if !action.bytes().all(|b| b.is_ascii_lowercase() || b == b'_') {
            issues.push(issue(
                "action",
                ErrorCode::InvalidInput,
                format!("`{action}` may only contain lowercase letters and `_`"),
            ));
        }
    }

    match present(object, "payload") {
        None => issues.push(issue("payload", ErrorCode::MissingField, "field is required")),
        Some(Value::Object(_)) => {}
        Some(other) => issues.push(issue(
            "payload",
            ErrorCode::InvalidType,
            format!("expected object, got {}", type_name(other)),
        )),
    }

    check_integer(object, "seed", 0, MAX_SEED, &mut issues);
    check_integer(object, "timeout_ms", MIN_TIMEOUT_MS, MAX_TIMEOUT_MS, &mut issues);

    match present(object, "version") {
        None => {}
        Some(Value::String(raw)) => {
            if let Err(error) = raw.parse::<SemVer>() {
                issues.push(issue(
                    "version",
                    ErrorCode::InvalidVersionFormat,
                    error.to_string(),
                ));
            }
        }
        Some(other) => issues.push(issue(
            "version",
            ErrorCode::InvalidType,
            format!("expected string, got {}", type_name(other)),
        )),
    }

    issues
}

fn issue(path: &str, code: ErrorCode, message: impl Into<String>) -> ValidationIssue {
    ValidationIssue::new(ValidationLayer::Schema, path, code, message)
}

/// Field value, treating explicit `null` as absent.
fn present<'a>(object: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    object.get(field).filter(|value| !value.is_null())
}

fn required_str<'a>(
    object: &'a Map<String, Value>,
    field: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<&'a str> {
    match present(object, field) {
        None => {
            issues.push(issue(field, ErrorCode::MissingField, "field is required"));
            None
        }
        Some(Value::String(value)) => Some(value.as_str()),
        Some(other) => {
            issues.push(issue(
                field,
                ErrorCode::InvalidType,
                format!("expected string, got {}", type_name(other)),
            ));
            None
        }
    }
}

fn check_integer(
    object: &Map<String, Value>,
    field: &str,
    min: u64,
    max: u64,
    issues: &mut Vec<ValidationIssue>,
) {
    let Some(value) = present(object, field) else {
        return;
    };
    let in_range = match value {
        Value::Number(number) if number.is_u64() => {
            number.as_u64().is_some_and(|n| (min..=max).contains(&n))
        }
        Value::Number(number) if number.is_i64() => false,
        other => {
            issues.push(issue(
                field,
                ErrorCode::InvalidType,
                format!("expected integer, got {}", type_name(other)),
            ));
            return;
        }
    };
    if !in_range {
        issues.push(issue(
            field,
            ErrorCode::OutOfRange,
            format!("{value} outside {min}..={max}"),
        ));
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
