use crate::error_code::ErrorKind;
use crate::structured::ValidationFailure;
use serde::Serialize;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "tool_calls[0].function.arguments")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected shape, raw payload excerpt)
    pub details: Option<String>,
    /// Source of the error (e.g., "narrow", "tool_binding", "extractor")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Unified error type for the function-calling runtime.
///
/// Model-caused failures (`Retryable`, `Parse`, `Validation`) are recoverable by
/// re-prompting; everything else is fatal. See [`Error::is_retryable`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("Retryable error: {message}{}", format_context(.context))]
    Retryable {
        message: String,
        context: ErrorContext,
    },

    #[error("Parse error: {message}{}", format_context(.context))]
    Parse {
        message: String,
        /// Field-level diagnostics when the payload parsed but failed the schema
        validation: Option<ValidationFailure>,
        context: ErrorContext,
    },

    #[error("Validation failure: {0}")]
    Validation(ValidationFailure),

    #[error("Timeout: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Protocol error: {message}{}", format_context(.context))]
    Protocol {
        message: String,
        context: ErrorContext,
    },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Schema error: {message}{}", format_context(.context))]
    Schema {
        message: String,
        context: ErrorContext,
    },

    #[error("Tool implementation error ({tool}): {source}")]
    Implementation {
        tool: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Budget exhausted after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: Box<Error> },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Transport error: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn retryable(msg: impl Into<String>) -> Self {
        Error::Retryable {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse {
            message: msg.into(),
            validation: None,
            context: ErrorContext::new(),
        }
    }

    pub fn parse_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Parse {
            message: msg.into(),
            validation: None,
            context,
        }
    }

    /// A parse error for a payload that was valid JSON but failed the schema.
    pub fn parse_invalid(failure: ValidationFailure, context: ErrorContext) -> Self {
        Error::Parse {
            message: format!("value does not match schema: {}", failure),
            validation: Some(failure),
            context,
        }
    }

    pub fn protocol_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Protocol {
            message: msg.into(),
            context,
        }
    }

    pub fn schema_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Schema {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout: std::time::Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Classify this error.
    ///
    /// `Exhausted` reports the kind of the failure that used up the budget.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Retryable { .. } => ErrorKind::Retryable,
            Error::Parse { .. } => ErrorKind::ParseError,
            Error::Validation(_) => ErrorKind::ValidationFailure,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Protocol { .. } => ErrorKind::Protocol,
            Error::Cancelled(_) => ErrorKind::Cancelled,
            Error::Schema { .. } => ErrorKind::Schema,
            Error::Implementation { .. } => ErrorKind::Implementation,
            Error::Exhausted { last, .. } => last.kind(),
            Error::Configuration { .. } => ErrorKind::Configuration,
            Error::Transport { .. } => ErrorKind::Transport,
            Error::Io(_) => ErrorKind::Unknown,
            Error::Serialization(_) => ErrorKind::Unknown,
        }
    }

    /// Whether re-prompting the model can correct this failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Exhausted { .. } => false,
            other => other.kind().retryable(),
        }
    }

    /// Whether this error ended a retry budget.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Error::Exhausted { .. })
    }

    /// Wrap a retryable error as the fatal end of a budget.
    pub fn exhausted(attempts: u32, last: Error) -> Self {
        Error::Exhausted {
            attempts,
            last: Box::new(last),
        }
    }

    /// Field-level diagnostics, if this error carries any.
    pub fn validation_failure(&self) -> Option<&ValidationFailure> {
        match self {
            Error::Validation(failure) => Some(failure),
            Error::Parse { validation, .. } => validation.as_ref(),
            Error::Exhausted { last, .. } => last.validation_failure(),
            _ => None,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Retryable { context, .. }
            | Error::Parse { context, .. }
            | Error::Protocol { context, .. }
            | Error::Schema { context, .. }
            | Error::Configuration { context, .. } => Some(context),
            Error::Exhausted { last, .. } => last.context(),
            _ => None,
        }
    }
}

impl From<ValidationFailure> for Error {
    fn from(failure: ValidationFailure) -> Self {
        Error::Validation(failure)
    }
}

/// Failure surfaced across the public run boundary.
///
/// A plain data object (kind + message + optional diagnostics) so callers can
/// branch on the failure kind without holding the error chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunError {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

impl From<&Error> for RunError {
    fn from(err: &Error) -> Self {
        let kind = err.kind();
        Self {
            kind,
            code: kind.code(),
            message: err.to_string(),
            retryable: err.is_retryable(),
            diagnostics: err
                .validation_failure()
                .map(|f| f.messages())
                .unwrap_or_default(),
        }
    }
}

impl From<Error> for RunError {
    fn from(err: Error) -> Self {
        RunError::from(&err)
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
