//! Binding a schema to a tool implementation.

use super::ToolError;
use crate::error::{Error, ErrorContext};
use crate::schema::{to_call_spec, CallSpec, Schema};
use crate::types::Message;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// Object-safe tool implementation, called with already validated arguments.
///
/// Most tools are closures wrapped by [`ToolBinding::bind`] or
/// [`ToolBinding::typed`]; implement this directly for tools that hold state.
pub trait ToolHandler: Send + Sync {
    fn call(&self, arguments: Value) -> BoxFuture<'static, Result<Value, ToolError>>;
}

struct FnHandler<F> {
    handler: F,
}

impl<F, Fut, O> ToolHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, ToolError>> + Send + 'static,
    O: Serialize + Send + 'static,
{
    fn call(&self, arguments: Value) -> BoxFuture<'static, Result<Value, ToolError>> {
        let fut = (self.handler)(arguments);
        Box::pin(async move { to_result_value(fut.await?) })
    }
}

struct TypedHandler<T, F> {
    handler: F,
    _input: PhantomData<fn(T)>,
}

impl<T, F, Fut, O> ToolHandler for TypedHandler<T, F>
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, ToolError>> + Send + 'static,
    O: Serialize + Send + 'static,
{
    fn call(&self, arguments: Value) -> BoxFuture<'static, Result<Value, ToolError>> {
        match serde_json::from_value::<T>(arguments) {
            Ok(input) => {
                let fut = (self.handler)(input);
                Box::pin(async move { to_result_value(fut.await?) })
            }
            Err(e) => {
                let err = ToolError::retryable(format!("arguments do not fit the input type: {}", e));
                Box::pin(async move { Err(err) })
            }
        }
    }
}

fn to_result_value<O: Serialize>(output: O) -> Result<Value, ToolError> {
    serde_json::to_value(output)
        .map_err(|e| ToolError::fatal(format!("tool result is not serializable: {}", e)))
}

/// Where the argument payload comes from.
#[derive(Debug, Clone, Copy)]
pub enum ToolInput<'a> {
    /// A JSON-encoded arguments string
    Raw(&'a str),
    /// A call request; `call_id` selects the `tool_calls` entry, otherwise the
    /// first entry naming this tool is used.
    Message {
        message: &'a Message,
        call_id: Option<&'a str>,
    },
}

impl<'a> ToolInput<'a> {
    pub fn call(message: &'a Message, call_id: &'a str) -> Self {
        ToolInput::Message {
            message,
            call_id: Some(call_id),
        }
    }
}

impl<'a> From<&'a str> for ToolInput<'a> {
    fn from(raw: &'a str) -> Self {
        ToolInput::Raw(raw)
    }
}

impl<'a> From<&'a String> for ToolInput<'a> {
    fn from(raw: &'a String) -> Self {
        ToolInput::Raw(raw.as_str())
    }
}

impl<'a> From<&'a Message> for ToolInput<'a> {
    fn from(message: &'a Message) -> Self {
        ToolInput::Message {
            message,
            call_id: None,
        }
    }
}

/// A schema, the call spec derived from it, and the implementation.
///
/// Immutable after construction; share it behind an `Arc` across turns and
/// concurrent dispatches.
#[derive(Clone)]
pub struct ToolBinding {
    spec: CallSpec,
    schema: Schema,
    handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for ToolBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolBinding")
            .field("name", &self.spec.name)
            .finish_non_exhaustive()
    }
}

impl ToolBinding {
    /// Bind a closure that receives the validated (and coerced) JSON arguments.
    pub fn bind<F, Fut, O>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Schema,
        handler: F,
    ) -> crate::Result<Self>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, ToolError>> + Send + 'static,
        O: Serialize + Send + 'static,
    {
        Self::from_handler(name, description, schema, Arc::new(FnHandler { handler }))
    }

    /// Bind a closure taking a typed input; the schema is derived from `T`.
    pub fn typed<T, F, Fut, O>(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: F,
    ) -> crate::Result<Self>
    where
        T: schemars::JsonSchema + DeserializeOwned + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, ToolError>> + Send + 'static,
        O: Serialize + Send + 'static,
    {
        let schema = Schema::from_type::<T>()?;
        Self::from_handler(
            name,
            description,
            schema,
            Arc::new(TypedHandler {
                handler,
                _input: PhantomData,
            }),
        )
    }

    pub fn from_handler(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Schema,
        handler: Arc<dyn ToolHandler>,
    ) -> crate::Result<Self> {
        let spec = to_call_spec(name, description, &schema)?;
        Ok(Self {
            spec,
            schema,
            handler,
        })
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &CallSpec {
        &self.spec
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Extract, decode and validate the argument payload.
    ///
    /// Invalid JSON is a retryable [`Error::Parse`]; valid JSON that fails the
    /// schema is a retryable [`Error::Validation`]. A message that carries no
    /// matching call request is a [`Error::Protocol`].
    pub fn parse_input<'a>(&self, input: impl Into<ToolInput<'a>>) -> crate::Result<Value> {
        let raw = self.arguments_of(input.into())?;

        // Models send "" for argument-less calls.
        let payload = if raw.trim().is_empty() { "{}" } else { raw };

        let decoded: Value = serde_json::from_str(payload).map_err(|e| {
            Error::parse_with_context(
                format!("arguments are not valid JSON: {}", e),
                ErrorContext::new()
                    .with_field_path("function.arguments")
                    .with_details(payload.chars().take(200).collect::<String>())
                    .with_source(format!("tool:{}", self.name())),
            )
        })?;

        self.schema.validate(&decoded).map_err(Error::Validation)
    }

    /// Parse the input, then run the implementation.
    ///
    /// Does not retry; classified errors propagate unchanged.
    pub async fn invoke<'a>(&self, input: impl Into<ToolInput<'a>>) -> crate::Result<Value> {
        let arguments = self.parse_input(input)?;
        self.handler
            .call(arguments)
            .await
            .map_err(|e| e.into_error(self.name()))
    }

    fn arguments_of<'a>(&self, input: ToolInput<'a>) -> crate::Result<&'a str> {
        let (message, call_id) = match input {
            ToolInput::Raw(raw) => return Ok(raw),
            ToolInput::Message { message, call_id } => (message, call_id),
        };

        let found = match message {
            Message::ToolCall { calls, .. } => calls
                .iter()
                .find(|c| match call_id {
                    Some(id) => c.id == id,
                    None => c.name() == self.name(),
                })
                .map(|c| c.arguments()),
            Message::FunctionCall { call, .. } if call.name == self.name() => {
                Some(call.arguments.as_str())
            }
            _ => None,
        };

        found.ok_or_else(|| {
            Error::protocol_with_context(
                format!("message carries no call request for '{}'", self.name()),
                ErrorContext::new()
                    .with_details(call_id.map(|id| format!("call id: {}", id)).unwrap_or_default())
                    .with_source("tool_binding"),
            )
        })
    }
}
