//! Error types for schema validation.

use serde::Serialize;
use std::fmt;

/// One failing location in a validated value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// JSON path to the failing field (e.g., "user.name", "items[0].price").
    /// Empty for the root value.
    pub path: String,
    /// Human-readable reason
    pub message: String,
    /// The offending value, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: serde_json::Value) -> Self {
        self.value = Some(value);
        self
    }

    /// The path as shown to humans: `$` for the root.
    pub fn display_path(&self) -> &str {
        if self.path.is_empty() {
            "$"
        } else {
            &self.path
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.display_path(), self.message)
    }
}

/// Structured validation failure: one issue per failing path, ordered by
/// first occurrence during traversal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ValidationFailure {
    issues: Vec<ValidationIssue>,
}

impl ValidationFailure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a failure from a single issue.
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        let mut failure = Self::new();
        failure.push(ValidationIssue::new(path, message));
        failure
    }

    /// Records an issue unless its path already failed.
    pub fn push(&mut self, issue: ValidationIssue) {
        if !self.issues.iter().any(|i| i.path == issue.path) {
            self.issues.push(issue);
        }
    }

    /// Merge another failure, keeping first-occurrence order.
    pub fn extend(&mut self, other: ValidationFailure) {
        for issue in other.issues {
            self.push(issue);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Get issues as formatted strings.
    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.to_string()).collect()
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages().join("; "))
    }
}

impl std::error::Error for ValidationFailure {}

impl From<ValidationIssue> for ValidationFailure {
    fn from(issue: ValidationIssue) -> Self {
        let mut failure = Self::new();
        failure.push(issue);
        failure
    }
}
