//! 消息类型模块：定义对话消息的标签联合与工具调用的线格式。
//!
//! # Types Module
//!
//! Conversation turns and the call payloads they carry.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Closed set of seven tagged message variants |
//! | [`RawMessage`] | Untyped wire shape; narrowed into a [`Message`] |
//! | [`MessageRole`] | system, user, assistant, function, tool |
//! | [`ToolCallRequest`] | One entry of an assistant's `tool_calls` |
//! | [`FunctionCall`] | Function name plus JSON-encoded arguments |
//! | [`ToolDefinition`] | Tool definition handed to the model |
//!
//! ## Example
//!
//! ```rust
//! use ai_fncall::types::{Message, RawMessage, ToolCallRequest};
//!
//! let raw = RawMessage::tool_calls(vec![ToolCallRequest::new(
//!     "call_1",
//!     "get_weather",
//!     r#"{"city": "Oslo"}"#,
//! )]);
//! let message = Message::narrow(raw).unwrap();
//! assert!(message.is_tool_call());
//! assert!(message.content().is_none());
//! ```

pub mod message;
pub mod tool;

pub use message::{Message, MessageRole, RawMessage};
pub use tool::{FunctionCall, FunctionDefinition, ToolCallRequest, ToolDefinition};
