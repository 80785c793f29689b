use arbiter_protocol::{CallError, ErrorCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLayer {
    Syntax,
    Schema,
    Semantics,
}

/// One violation, pointing at the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub layer: ValidationLayer,
    /// Dotted field path, `$` for the input as a whole.
    pub path: String,
    pub code: ErrorCode,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(
        layer: ValidationLayer,
        path: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            layer,
            path: path.into(),
            code,
            message: message.into(),
        }
    }
}

/// Violations grouped by layer. Layers short-circuit, so at most one layer
/// is populated; the syntax layer holds at most one issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub syntax: Option<ValidationIssue>,
    pub schema: Vec<ValidationIssue>,
    pub semantics: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn syntax(issue: ValidationIssue) -> Self {
        Self {
            syntax: Some(issue),
            ..Self::default()
        }
    }

    pub fn schema(issues: Vec<ValidationIssue>) -> Self {
        Self {
            schema: issues,
            ..Self::default()
        }
    }

    pub fn semantics(issues: Vec<ValidationIssue>) -> Self {
        Self {
            semantics: issues,
            ..Self::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.syntax.is_none() && self.schema.is_empty() && self.semantics.is_empty()
    }

    /// All issues in layer order.
    pub fn issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.syntax
            .iter()
            .chain(self.schema.iter())
            .chain(self.semantics.iter())
    }

    /// First syntax issue, else first schema issue, else first semantic issue.
    pub fn primary(&self) -> Option<&ValidationIssue> {
        self.issues().next()
    }

    pub fn primary_code(&self) -> Option<ErrorCode> {
        self.primary().map(|issue| issue.code)
    }

    pub fn failed_layer(&self) -> Option<ValidationLayer> {
        self.primary().map(|issue| issue.layer)
    }

    /// Structured error for the response, listing every issue in `details`.
    pub fn to_call_error(&self) -> CallError {
        let (code, message) = match self.primary() {
            Some(issue) => (issue.code, format!("{}: {}", issue.path, issue.message)),
            None => (ErrorCode::Internal, "validation failed without issues".to_owned()),
        };
        let issues: Vec<_> = self
            .issues()
            .map(|issue| {
                json!({
                    "layer": issue.layer,
                    "path": issue.path,
                    "code": issue.code,
                    "message": issue.message,
                })
            })
            .collect();
        CallError::new(code, message)
            .with_recoverable(false)
            .with_details(json!({ "issues": issues }))
    }
}
