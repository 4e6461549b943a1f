//! Chain configuration.
//!
//! Defaults suit interactive agents. Values can come from code (builder
//! setters), YAML, or `AI_FNCALL_*` environment variables layered on top.
//!
//! | Key | Env | Default |
//! |-----|-----|---------|
//! | `max_iterations` | `AI_FNCALL_MAX_ITERATIONS` | 8 |
//! | `max_retries` | `AI_FNCALL_MAX_RETRIES` | 3 |
//! | `call_timeout_ms` | `AI_FNCALL_CALL_TIMEOUT_MS` | 60000 |
//! | `tool_timeout_ms` | `AI_FNCALL_TOOL_TIMEOUT_MS` | none |
//! | `parallel_tools` | `AI_FNCALL_PARALLEL_TOOLS` | true |
//! | `normalize_content` | | true |

use crate::error::{Error, ErrorContext};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Model submissions per run
    pub max_iterations: u32,
    /// Corrective resubmissions after retryable failures
    pub max_retries: u32,
    /// Deadline for each transport call
    pub call_timeout_ms: u64,
    /// Deadline for each tool invocation
    pub tool_timeout_ms: Option<u64>,
    /// Run the calls of one batch concurrently
    pub parallel_tools: bool,
    /// Normalize text of messages built by the loop (corrective prompts)
    pub normalize_content: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_iterations: 8,
            max_retries: 3,
            call_timeout_ms: 60_000,
            tool_timeout_ms: None,
            parallel_tools: true,
            normalize_content: true,
        }
    }
}

impl ChainConfig {
    pub fn from_yaml_str(yaml: &str) -> crate::Result<Self> {
        let config: ChainConfig = serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid chain config: {}", e),
                ErrorContext::new().with_source("yaml"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text).map_err(|e| match e {
            Error::Configuration { message, context } => Error::Configuration {
                message,
                context: context.with_source(path.display().to_string()),
            },
            other => other,
        })
    }

    /// Apply `AI_FNCALL_*` overrides. Unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_value("AI_FNCALL_MAX_ITERATIONS") {
            self.max_iterations = v;
        }
        if let Some(v) = env_value("AI_FNCALL_MAX_RETRIES") {
            self.max_retries = v;
        }
        if let Some(v) = env_value("AI_FNCALL_CALL_TIMEOUT_MS") {
            self.call_timeout_ms = v;
        }
        if let Some(v) = env_value("AI_FNCALL_TOOL_TIMEOUT_MS") {
            self.tool_timeout_ms = Some(v);
        }
        if let Some(v) = env_value("AI_FNCALL_PARALLEL_TOOLS") {
            self.parallel_tools = v;
        }
        self
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations", "must be at least 1"));
        }
        if self.max_retries == 0 {
            return Err(invalid("max_retries", "must be at least 1"));
        }
        if self.call_timeout_ms == 0 {
            return Err(invalid("call_timeout_ms", "must be positive"));
        }
        if self.tool_timeout_ms == Some(0) {
            return Err(invalid("tool_timeout_ms", "must be positive"));
        }
        Ok(())
    }

    pub fn max_iterations(mut self, n: u32) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn parallel_tools(mut self, parallel: bool) -> Self {
        self.parallel_tools = parallel;
        self
    }

    pub fn normalize_content(mut self, normalize: bool) -> Self {
        self.normalize_content = normalize;
        self
    }

    pub fn call_deadline(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn tool_deadline(&self) -> Option<Duration> {
        self.tool_timeout_ms.map(Duration::from_millis)
    }
}

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

fn invalid(field: &str, reason: &str) -> Error {
    Error::configuration_with_context(
        format!("{} {}", field, reason),
        ErrorContext::new()
            .with_field_path(field)
            .with_source("chain_config"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ChainConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.call_deadline(), Duration::from_secs(60));
        assert_eq!(config.tool_deadline(), None);
    }

    #[test]
    fn test_yaml_partial_override() {
        let config = ChainConfig::from_yaml_str("max_iterations: 4\nparallel_tools: false\n").unwrap();
        assert_eq!(config.max_iterations, 4);
        assert!(!config.parallel_tools);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_yaml_validation() {
        let err = ChainConfig::from_yaml_str("max_retries: 0").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(ChainConfig::from_yaml_str("max_iterations: [1]").is_err());
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("AI_FNCALL_MAX_ITERATIONS", "12");
        env::set_var("AI_FNCALL_TOOL_TIMEOUT_MS", "not-a-number");
        let config = ChainConfig::default().with_env_overrides();
        env::remove_var("AI_FNCALL_MAX_ITERATIONS");
        env::remove_var("AI_FNCALL_TOOL_TIMEOUT_MS");

        assert_eq!(config.max_iterations, 12);
        assert_eq!(config.tool_timeout_ms, None);
    }
}
