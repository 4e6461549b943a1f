//! 错误分类码：为函数调用运行时的每类失败定义稳定的错误码与重试语义。
//!
//! Failure classification codes.
//!
//! Every [`crate::Error`] maps to exactly one [`ErrorKind`]. The kind carries a
//! stable code string, a snake_case name, a category and whether failures of
//! that kind are recoverable by re-prompting the model.
//!
//! ## Categories
//!
//! | Prefix | Category    | Description                                 |
//! |--------|-------------|---------------------------------------------|
//! | E1xxx  | model       | Malformed model output, fixable by re-prompt |
//! | E2xxx  | deadline    | Transport or tool deadline exceeded         |
//! | E3xxx  | protocol    | Transport contract violations               |
//! | E4xxx  | operational | Cancellation, budget exhaustion             |
//! | E5xxx  | setup       | Schema and configuration defects            |
//! | E9xxx  | unknown     | Implementation and unclassified failures    |
//!
//! ## Example
//!
//! ```rust
//! use ai_fncall::error_code::ErrorKind;
//!
//! let kind = ErrorKind::from_name("parse_error").unwrap();
//! assert_eq!(kind.code(), "E1002");
//! assert!(kind.retryable());
//! assert_eq!(kind.category(), "model");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// E1001: Model-caused failure, recoverable by re-prompting
    Retryable,
    /// E1002: Model output was not parseable structured data
    ParseError,
    /// E1003: Structured data did not match the schema
    ValidationFailure,
    /// E2001: Transport or tool deadline exceeded
    Timeout,
    /// E3001: Malformed message shape from the transport
    Protocol,
    /// E3002: Transport failed (HTTP status, connection)
    Transport,
    /// E4001: Run cancelled by the caller
    Cancelled,
    /// E4002: Iteration or retry budget exhausted
    Exhausted,
    /// E5001: Schema cannot back a tool or extractor
    Schema,
    /// E5002: Invalid configuration or registry setup
    Configuration,
    /// E9001: Tool implementation raised an unclassified error
    Implementation,
    /// E9999: Error could not be classified
    Unknown,
}

impl ErrorKind {
    /// Returns the canonical code string (e.g., `"E1002"`).
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Retryable => "E1001",
            Self::ParseError => "E1002",
            Self::ValidationFailure => "E1003",
            Self::Timeout => "E2001",
            Self::Protocol => "E3001",
            Self::Transport => "E3002",
            Self::Cancelled => "E4001",
            Self::Exhausted => "E4002",
            Self::Schema => "E5001",
            Self::Configuration => "E5002",
            Self::Implementation => "E9001",
            Self::Unknown => "E9999",
        }
    }

    /// Returns the standard name (e.g., `"parse_error"`).
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Retryable => "retryable",
            Self::ParseError => "parse_error",
            Self::ValidationFailure => "validation_failure",
            Self::Timeout => "timeout",
            Self::Protocol => "protocol",
            Self::Transport => "transport",
            Self::Cancelled => "cancelled",
            Self::Exhausted => "exhausted",
            Self::Schema => "schema",
            Self::Configuration => "configuration",
            Self::Implementation => "implementation",
            Self::Unknown => "unknown",
        }
    }

    /// Whether failures of this kind are corrected by re-prompting the model.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::Retryable | Self::ParseError | Self::ValidationFailure
        )
    }

    /// Returns the category: `"model"`, `"deadline"`, `"protocol"`, `"operational"`,
    /// `"setup"`, or `"unknown"`.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Retryable | Self::ParseError | Self::ValidationFailure => "model",
            Self::Timeout => "deadline",
            Self::Protocol | Self::Transport => "protocol",
            Self::Cancelled | Self::Exhausted => "operational",
            Self::Schema | Self::Configuration => "setup",
            Self::Implementation | Self::Unknown => "unknown",
        }
    }

    /// Looks up a kind by its standard name.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "retryable" => Self::Retryable,
            "parse_error" => Self::ParseError,
            "validation_failure" => Self::ValidationFailure,
            "timeout" => Self::Timeout,
            "protocol" => Self::Protocol,
            "transport" => Self::Transport,
            "cancelled" => Self::Cancelled,
            "exhausted" => Self::Exhausted,
            "schema" => Self::Schema,
            "configuration" => Self::Configuration,
            "implementation" => Self::Implementation,
            "unknown" => Self::Unknown,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
