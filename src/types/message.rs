//! Tagged message model.
//!
//! [`RawMessage`] is the untyped wire shape every transport speaks.
//! [`Message`] is the closed set of seven variants the rest of the crate
//! works with; [`Message::narrow`] classifies a raw message into exactly one
//! of them or fails with a protocol error.

use crate::error::{Error, ErrorContext};
use crate::types::tool::{FunctionCall, ToolCallRequest};
use crate::utils::text::normalize;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Function,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Function => "function",
            MessageRole::Tool => "tool",
        }
    }
}

/// Untyped message as it travels over the wire.
///
/// Which fields are meaningful depends on the role and on whether the message
/// carries a call request; [`Message::narrow`] enforces that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub role: MessageRole,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl RawMessage {
    pub fn new(role: MessageRole, content: Option<String>) -> Self {
        Self {
            role,
            content,
            name: None,
            function_call: None,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Assistant text response.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, Some(content.into()))
    }

    /// Assistant response requesting tool calls.
    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls: Some(calls),
            ..Self::new(MessageRole::Assistant, None)
        }
    }

    /// Assistant response requesting a legacy function call.
    pub fn function_call(call: FunctionCall) -> Self {
        Self {
            function_call: Some(call),
            ..Self::new(MessageRole::Assistant, None)
        }
    }

    /// Classify into a [`Message`] variant.
    pub fn narrow(self) -> crate::Result<Message> {
        Message::narrow(self)
    }
}

/// One conversation turn.
///
/// `content` is absent exactly on call requests (`FunctionCall`, `ToolCall`),
/// and a call request carries exactly one of the two call payloads. Both hold
/// by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RawMessage", try_from = "RawMessage")]
pub enum Message {
    System {
        content: String,
        name: Option<String>,
    },
    User {
        content: String,
        name: Option<String>,
    },
    Assistant {
        content: String,
        name: Option<String>,
    },
    /// Legacy single function request
    FunctionCall {
        call: FunctionCall,
        name: Option<String>,
    },
    /// One or more parallel tool requests
    ToolCall {
        calls: Vec<ToolCallRequest>,
        name: Option<String>,
    },
    /// Result of a legacy function call
    FunctionResult { name: String, content: String },
    /// Result of one tool call, correlated by id
    ToolResult {
        tool_call_id: String,
        content: String,
    },
}

impl Message {
    /// System message with normalized content.
    pub fn system(text: impl AsRef<str>) -> Self {
        Self::system_exact(normalize(text.as_ref()))
    }

    /// System message with content kept byte-for-byte.
    pub fn system_exact(text: impl Into<String>) -> Self {
        Message::System {
            content: text.into(),
            name: None,
        }
    }

    /// User message with normalized content.
    pub fn user(text: impl AsRef<str>) -> Self {
        Self::user_exact(normalize(text.as_ref()))
    }

    pub fn user_exact(text: impl Into<String>) -> Self {
        Message::User {
            content: text.into(),
            name: None,
        }
    }

    /// Assistant message with normalized content.
    pub fn assistant(text: impl AsRef<str>) -> Self {
        Self::assistant_exact(normalize(text.as_ref()))
    }

    pub fn assistant_exact(text: impl Into<String>) -> Self {
        Message::Assistant {
            content: text.into(),
            name: None,
        }
    }

    /// Call-request message. At least one call is required.
    pub fn tool_call(calls: Vec<ToolCallRequest>) -> crate::Result<Self> {
        if calls.is_empty() {
            return Err(protocol_error("tool call message without calls", "tool_calls"));
        }
        Ok(Message::ToolCall { calls, name: None })
    }

    pub fn function_call(call: FunctionCall) -> Self {
        Message::FunctionCall { call, name: None }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::ToolResult {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    pub fn function_result(name: impl Into<String>, content: impl Into<String>) -> Self {
        Message::FunctionResult {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Attach a participant name. Result variants are returned unchanged
    /// (their `name`, if any, is structural).
    pub fn with_name(mut self, participant: impl Into<String>) -> Self {
        match &mut self {
            Message::System { name, .. }
            | Message::User { name, .. }
            | Message::Assistant { name, .. }
            | Message::FunctionCall { name, .. }
            | Message::ToolCall { name, .. } => *name = Some(participant.into()),
            Message::FunctionResult { .. } | Message::ToolResult { .. } => {}
        }
        self
    }

    /// Classify an untyped message into exactly one variant.
    ///
    /// Order: null content with `tool_calls` is a ToolCall; null content with
    /// `function_call` is a FunctionCall; otherwise the role decides. Null
    /// content with no call payload is a protocol violation. Empty or
    /// whitespace-only content next to a call payload counts as null.
    pub fn narrow(raw: RawMessage) -> crate::Result<Message> {
        let RawMessage {
            role,
            content,
            name,
            function_call,
            tool_calls,
            tool_call_id,
        } = raw;

        let has_calls = tool_calls.as_ref().is_some_and(|c| !c.is_empty());
        let content = match content {
            Some(c) if c.trim().is_empty() && (has_calls || function_call.is_some()) => None,
            other => other,
        };

        let content = match content {
            Some(content) => content,
            None => {
                if role != MessageRole::Assistant && (has_calls || function_call.is_some()) {
                    return Err(protocol_error(
                        format!("{} message carries a call request", role.as_str()),
                        "role",
                    ));
                }
                if has_calls {
                    return Ok(Message::ToolCall {
                        calls: tool_calls.unwrap_or_default(),
                        name,
                    });
                }
                if let Some(call) = function_call {
                    return Ok(Message::FunctionCall { call, name });
                }
                return Err(protocol_error(
                    format!(
                        "{} message has null content and no call payload",
                        role.as_str()
                    ),
                    "content",
                ));
            }
        };

        if has_calls || function_call.is_some() {
            warn!(
                role = role.as_str(),
                tool_calls = tool_calls.as_ref().map_or(0, Vec::len),
                function_call = function_call.is_some(),
                "message has content; call payload discarded"
            );
        }

        match role {
            MessageRole::System => Ok(Message::System { content, name }),
            MessageRole::User => Ok(Message::User { content, name }),
            MessageRole::Assistant => Ok(Message::Assistant { content, name }),
            MessageRole::Function => match name {
                Some(name) => Ok(Message::FunctionResult { name, content }),
                None => Err(protocol_error("function result without a name", "name")),
            },
            MessageRole::Tool => match tool_call_id {
                Some(tool_call_id) => Ok(Message::ToolResult {
                    tool_call_id,
                    content,
                }),
                None => Err(protocol_error(
                    "tool result without a tool_call_id",
                    "tool_call_id",
                )),
            },
        }
    }

    /// Deserialize and narrow a JSON message.
    pub fn narrow_value(value: serde_json::Value) -> crate::Result<Message> {
        let raw: RawMessage = serde_json::from_value(value).map_err(|e| {
            Error::protocol_with_context(
                format!("malformed message: {}", e),
                ErrorContext::new().with_source("narrow"),
            )
        })?;
        Self::narrow(raw)
    }

    /// Render back to the wire shape.
    pub fn to_raw(&self) -> RawMessage {
        match self.clone() {
            Message::System { content, name } => RawMessage {
                name,
                ..RawMessage::new(MessageRole::System, Some(content))
            },
            Message::User { content, name } => RawMessage {
                name,
                ..RawMessage::new(MessageRole::User, Some(content))
            },
            Message::Assistant { content, name } => RawMessage {
                name,
                ..RawMessage::new(MessageRole::Assistant, Some(content))
            },
            Message::FunctionCall { call, name } => RawMessage {
                name,
                ..RawMessage::function_call(call)
            },
            Message::ToolCall { calls, name } => RawMessage {
                name,
                ..RawMessage::tool_calls(calls)
            },
            Message::FunctionResult { name, content } => RawMessage {
                name: Some(name),
                ..RawMessage::new(MessageRole::Function, Some(content))
            },
            Message::ToolResult {
                tool_call_id,
                content,
            } => RawMessage {
                tool_call_id: Some(tool_call_id),
                ..RawMessage::new(MessageRole::Tool, Some(content))
            },
        }
    }

    pub fn role(&self) -> MessageRole {
        match self {
            Message::System { .. } => MessageRole::System,
            Message::User { .. } => MessageRole::User,
            Message::Assistant { .. } | Message::FunctionCall { .. } | Message::ToolCall { .. } => {
                MessageRole::Assistant
            }
            Message::FunctionResult { .. } => MessageRole::Function,
            Message::ToolResult { .. } => MessageRole::Tool,
        }
    }

    /// Text content; `None` exactly for call requests.
    pub fn content(&self) -> Option<&str> {
        match self {
            Message::System { content, .. }
            | Message::User { content, .. }
            | Message::Assistant { content, .. }
            | Message::FunctionResult { content, .. }
            | Message::ToolResult { content, .. } => Some(content),
            Message::FunctionCall { .. } | Message::ToolCall { .. } => None,
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Message::System { .. })
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Message::User { .. })
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, Message::Assistant { .. })
    }

    pub fn is_function_call(&self) -> bool {
        matches!(self, Message::FunctionCall { .. })
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self, Message::ToolCall { .. })
    }

    pub fn is_function_result(&self) -> bool {
        matches!(self, Message::FunctionResult { .. })
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, Message::ToolResult { .. })
    }

    /// FunctionCall or ToolCall.
    pub fn is_call_request(&self) -> bool {
        self.is_function_call() || self.is_tool_call()
    }
}

impl From<Message> for RawMessage {
    fn from(message: Message) -> Self {
        message.to_raw()
    }
}

impl TryFrom<RawMessage> for Message {
    type Error = Error;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        Message::narrow(raw)
    }
}

fn protocol_error(message: impl Into<String>, field: &str) -> Error {
    Error::protocol_with_context(
        message,
        ErrorContext::new()
            .with_field_path(field)
            .with_source("narrow"),
    )
}
