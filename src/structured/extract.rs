//! Structured-output extraction with bounded corrective retries.
//!
//! [`Extractor::extract`] is a single, pure attempt: locate JSON in the text,
//! validate it against the target schema, return the coerced value or a
//! retryable parse error. [`Extractor::run`] wraps that in the model round
//! trip: on a parse error it appends the rejected answer plus a corrective
//! instruction and resubmits, at most `max_attempts` submissions in total.

use super::locate::locate_json;
use super::ResponseFormat;
use crate::error::{Error, ErrorContext};
use crate::schema::Schema;
use crate::transport::{submit, ChatRequest, ChatTransport};
use crate::types::Message;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Longest excerpt of rejected output quoted in error context.
const EXCERPT_CHARS: usize = 200;

/// Builds the corrective instruction sent after a rejected answer.
pub type RetryPrompt = Arc<dyn Fn(&Error) -> String + Send + Sync>;

/// Options for [`Extractor`].
#[derive(Clone)]
pub struct ExtractOptions {
    /// Model submissions allowed in [`Extractor::run`], first one included
    pub max_attempts: u32,
    pub on_retry_prompt: Option<RetryPrompt>,
    /// Deadline for each model submission
    pub call_timeout: Option<Duration>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            on_retry_prompt: None,
            call_timeout: None,
        }
    }
}

impl fmt::Debug for ExtractOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractOptions")
            .field("max_attempts", &self.max_attempts)
            .field("on_retry_prompt", &self.on_retry_prompt.is_some())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

/// Successful [`Extractor::run`].
#[derive(Debug, Clone)]
pub struct Extracted {
    pub value: Value,
    /// Submissions made; 1 means the first answer was accepted
    pub attempts: u32,
    /// Seed messages plus every answer and correction exchanged
    pub conversation: Vec<Message>,
}

/// Turns free-form model text into a value that satisfies a schema.
#[derive(Debug, Clone)]
pub struct Extractor {
    schema: Schema,
    options: ExtractOptions,
}

impl Extractor {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            options: ExtractOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.options.max_attempts = attempts;
        self
    }

    pub fn on_retry_prompt<F>(mut self, prompt: F) -> Self
    where
        F: Fn(&Error) -> String + Send + Sync + 'static,
    {
        self.options.on_retry_prompt = Some(Arc::new(prompt));
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.options.call_timeout = Some(timeout);
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Response-format hint for transports with a native JSON mode.
    pub fn response_format(&self) -> ResponseFormat {
        ResponseFormat::for_schema(&self.schema)
    }

    /// One extraction attempt.
    ///
    /// Fails with a retryable [`Error::Parse`] when no JSON value is found or
    /// the value does not satisfy the schema; in the latter case the error
    /// carries the field-level diagnostics.
    pub fn extract(&self, text: &str) -> crate::Result<Value> {
        let Some(candidate) = locate_json(text) else {
            return Err(Error::parse_with_context(
                "no JSON value found in model output",
                ErrorContext::new()
                    .with_details(excerpt(text))
                    .with_source("extractor"),
            ));
        };

        self.schema.validate(&candidate).map_err(|failure| {
            Error::parse_invalid(failure, ErrorContext::new().with_source("extractor"))
        })
    }

    /// [`extract`](Self::extract), then deserialize into `T`.
    pub fn extract_as<T: DeserializeOwned>(&self, text: &str) -> crate::Result<T> {
        let value = self.extract(text)?;
        serde_json::from_value(value).map_err(|e| {
            Error::parse_with_context(
                format!("value does not fit the target type: {}", e),
                ErrorContext::new().with_source("extractor"),
            )
        })
    }

    /// Corrective instruction for a rejected answer.
    pub fn retry_prompt(&self, error: &Error) -> String {
        if let Some(prompt) = &self.options.on_retry_prompt {
            return prompt(error);
        }
        corrective_prompt(error)
    }

    /// Ask the model, extract, and re-prompt on parse errors.
    ///
    /// Non-retryable failures (transport errors, timeouts, cancellation)
    /// return immediately. After `max_attempts` rejected answers the last
    /// parse error is returned wrapped in [`Error::Exhausted`].
    pub async fn run(
        &self,
        transport: &dyn ChatTransport,
        messages: Vec<Message>,
        cancel: &CancellationToken,
    ) -> crate::Result<Extracted> {
        if self.options.max_attempts == 0 {
            return Err(Error::configuration_with_context(
                "max_attempts must be at least 1",
                ErrorContext::new().with_field_path("max_attempts"),
            ));
        }

        let format = self.response_format();
        let mut conversation = messages;

        for attempt in 1..=self.options.max_attempts {
            let request =
                ChatRequest::new(conversation.clone()).with_response_format(format.clone());
            let raw = submit(transport, &request, self.options.call_timeout, cancel).await?;
            let answer = Message::narrow(raw)?;

            let outcome = match answer.content() {
                Some(text) if answer.is_assistant() => self.extract(text),
                _ => Err(Error::parse_with_context(
                    "expected a text answer, got a call request",
                    ErrorContext::new().with_source("extractor"),
                )),
            };

            match outcome {
                Ok(value) => {
                    debug!(attempt, "structured output accepted");
                    conversation.push(answer);
                    return Ok(Extracted {
                        value,
                        attempts: attempt,
                        conversation,
                    });
                }
                Err(err) if attempt < self.options.max_attempts => {
                    warn!(attempt, error_kind = err.kind().name(), "structured output rejected: {}", err);
                    let correction = self.retry_prompt(&err);
                    conversation.push(answer);
                    conversation.push(Message::user_exact(correction));
                }
                Err(err) => return Err(Error::exhausted(attempt, err)),
            }
        }

        // The loop returns on its last iteration.
        Err(Error::configuration_with_context(
            "max_attempts must be at least 1",
            ErrorContext::new().with_field_path("max_attempts"),
        ))
    }
}

/// Default corrective instruction: the error plus one line per failing field.
pub fn corrective_prompt(error: &Error) -> String {
    let mut prompt = format!("Your previous answer could not be used: {}", headline(error));
    if let Some(failure) = error.validation_failure() {
        prompt.push_str("\nProblems:");
        for issue in failure.issues() {
            prompt.push_str(&format!("\n- {}", issue));
        }
    }
    prompt.push_str("\nReply again with only a JSON value that conforms to the schema.");
    prompt
}

fn headline(error: &Error) -> String {
    match error {
        Error::Parse { message, .. } | Error::Retryable { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= EXCERPT_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(EXCERPT_CHARS).collect();
        format!("{}...", cut)
    }
}
