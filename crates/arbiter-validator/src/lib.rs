//! Three ordered validation layers in front of every call:
//!
//! 1. **syntax**: the input is a JSON object, or text that parses into one;
//! 2. **schema**: required fields, types, id/enum/range/version formats;
//! 3. **semantics**: action whitelist, required seeds, payload shape and size.
//!
//! A layer only runs when every earlier layer passed. Layers 2 and 3 report
//! every violation they find; layer 1 can only report one.

pub mod report;
mod schema;
mod semantics;

use arbiter_protocol::{CallInput, CallRequest, ErrorCode};
use serde_json::{Map, Value};
use tracing::debug;

pub use report::{ValidationIssue, ValidationLayer, ValidationReport};
pub use schema::{MAX_ACTION_LEN, MAX_SEED, MAX_TIMEOUT_MS, MIN_TIMEOUT_MS};

/// A request that passed all three layers, with the JSON form it was
/// validated from.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub request: CallRequest,
    pub raw: Value,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestValidator;

impl RequestValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, input: &CallInput) -> Result<ValidatedRequest, ValidationReport> {
        let object = self.syntax(input).map_err(ValidationReport::syntax)?;
        debug!("syntax layer passed");

        let request = self.schema(&object).map_err(ValidationReport::schema)?;
        debug!(route = %request.route(), "schema layer passed");

        self.semantics(&request).map_err(ValidationReport::semantics)?;
        debug!(route = %request.route(), "semantic layer passed");

        Ok(ValidatedRequest {
            request,
            raw: Value::Object(object),
        })
    }

    /// Layer 1.
    pub fn syntax(&self, input: &CallInput) -> Result<Map<String, Value>, ValidationIssue> {
        let value = match input {
            CallInput::Request(request) => serde_json::to_value(request).map_err(|error| {
                syntax_issue(format!("request could not be serialized: {error}"))
            })?,
            CallInput::Json(value) => value.clone(),
            CallInput::Text(text) => serde_json::from_str::<Value>(text)
                .map_err(|error| syntax_issue(format!("input is not valid JSON: {error}")))?,
        };
        match value {
            Value::Object(object) => Ok(object),
            _ => Err(syntax_issue("input must be a JSON object")),
        }
    }

    /// Layer 2.
    pub fn schema(
        &self,
        object: &Map<String, Value>,
    ) -> Result<CallRequest, Vec<ValidationIssue>> {
        let issues = schema::check(object);
        if !issues.is_empty() {
            return Err(issues);
        }
        serde_json::from_value(Value::Object(object.clone())).map_err(|error| {
            vec![ValidationIssue::new(
                ValidationLayer::Schema,
                "$",
                ErrorCode::InvalidType,
                error.to_string(),
            )]
        })
    }

    /// Layer 3.
    pub fn semantics(&self, request: &CallRequest) -> Result<(), Vec<ValidationIssue>> {
        let issues = semantics::check(request);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

fn syntax_issue(message: impl Into<String>) -> ValidationIssue {
    ValidationIssue::new(ValidationLayer::Syntax, "$", ErrorCode::InvalidInput, message)
}
