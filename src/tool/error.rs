//! Errors raised by tool implementations.

use crate::error::{Error, ErrorContext};

/// Error returned by a tool implementation.
///
/// Only [`ToolError::Retryable`] is classified as correctable by the model.
/// Everything else, including any `anyhow::Error` bubbling out of the
/// implementation, is treated as a defect and ends the run.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The arguments were acceptable to the schema but not to the tool
    /// (e.g. an unknown city); the model can try again.
    #[error("{0}")]
    Retryable(String),

    #[error("{0}")]
    Fatal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ToolError {
    pub fn retryable(message: impl Into<String>) -> Self {
        ToolError::Retryable(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        ToolError::Fatal(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ToolError::Retryable(_))
    }

    /// Classify into the crate error, attributing it to `tool`.
    pub fn into_error(self, tool: &str) -> Error {
        match self {
            ToolError::Retryable(message) => Error::Retryable {
                message,
                context: ErrorContext::new().with_source(format!("tool:{}", tool)),
            },
            ToolError::Fatal(message) => Error::Implementation {
                tool: tool.to_string(),
                source: anyhow::anyhow!(message),
            },
            ToolError::Other(source) => Error::Implementation {
                tool: tool.to_string(),
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_code::ErrorKind;

    #[test]
    fn test_classification() {
        let err = ToolError::retryable("unknown city").into_error("get_weather");
        assert!(err.is_retryable());
        assert_eq!(err.context().and_then(|c| c.source.as_deref()), Some("tool:get_weather"));

        let err = ToolError::fatal("disk full").into_error("save");
        assert_eq!(err.kind(), ErrorKind::Implementation);
        assert!(!err.is_retryable());

        let err: ToolError = anyhow::anyhow!("boom").into();
        assert!(!err.is_retryable());
        assert!(err.into_error("x").to_string().contains("boom"));
    }
}
