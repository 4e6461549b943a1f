//! Append-only conversation history.

use crate::error::{Error, ErrorContext};
use crate::types::Message;
use serde::Serialize;
use std::collections::HashSet;

/// Ordered message history of one run.
///
/// Messages can only be appended. Results must answer a call that appears
/// earlier: a `ToolResult` needs a prior `ToolCall` entry with the same id, a
/// `FunctionResult` a prior `FunctionCall` with the same name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
    #[serde(skip)]
    call_ids: HashSet<String>,
    #[serde(skip)]
    function_names: HashSet<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from seed messages, checking each as it is appended.
    pub fn from_messages(messages: impl IntoIterator<Item = Message>) -> crate::Result<Self> {
        let mut conversation = Self::new();
        for message in messages {
            conversation.push(message)?;
        }
        Ok(conversation)
    }

    pub fn push(&mut self, message: Message) -> crate::Result<()> {
        match &message {
            Message::ToolCall { calls, .. } => {
                self.call_ids.extend(calls.iter().map(|c| c.id.clone()));
            }
            Message::FunctionCall { call, .. } => {
                self.function_names.insert(call.name.clone());
            }
            Message::ToolResult { tool_call_id, .. } if !self.call_ids.contains(tool_call_id) => {
                return Err(uncorrelated(format!(
                    "tool result for unknown call id '{}'",
                    tool_call_id
                )));
            }
            Message::FunctionResult { name, .. } if !self.function_names.contains(name) => {
                return Err(uncorrelated(format!(
                    "function result for '{}' without a prior call",
                    name
                )));
            }
            _ => {}
        }
        self.messages.push(message);
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

fn uncorrelated(message: String) -> Error {
    Error::protocol_with_context(
        message,
        ErrorContext::new()
            .with_field_path("tool_call_id")
            .with_source("conversation"),
    )
}
