//! 传输层：模型调用的最小契约。
//!
//! # Transport
//!
//! The loop depends on a single operation: submit an ordered message list
//! plus the available call specifications, get back one raw response message.
//! Everything provider-specific lives behind [`ChatTransport`].
//!
//! | Implementation | Use |
//! |----------------|-----|
//! | [`http::HttpTransport`] | OpenAI-compatible chat-completions endpoint |
//! | [`mock::MockTransport`] | Scripted responses for tests and demos |
//!
//! Transports are constructed once and passed in explicitly; there is no
//! process-wide default client.

pub mod http;
pub mod mock;

use crate::error::Error;
use crate::schema::CallSpec;
use crate::structured::ResponseFormat;
use crate::types::{Message, RawMessage};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One model submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    /// Tools the model may request; empty when tool calling is off
    pub tools: Vec<CallSpec>,
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_tools(mut self, tools: Vec<CallSpec>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    /// OpenAI-compatible chat-completions body.
    pub fn to_openai_body(&self, model: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": model,
            "messages": self.messages.iter().map(Message::to_raw).collect::<Vec<_>>(),
        });
        if let Some(map) = body.as_object_mut() {
            if !self.tools.is_empty() {
                let tools: Vec<_> = self.tools.iter().map(CallSpec::to_tool_definition).collect();
                map.insert("tools".into(), serde_json::json!(tools));
            }
            if let Some(format) = self.response_format.as_ref().and_then(ResponseFormat::to_openai) {
                map.insert("response_format".into(), format);
            }
        }
        body
    }
}

/// Model transport: messages plus call specs in, one raw message out.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> crate::Result<RawMessage>;
}

/// Submit `request` under an optional deadline, aborting on cancellation.
///
/// A missed deadline is a fatal [`Error::Timeout`]; cancellation yields
/// [`Error::Cancelled`]. The in-flight call is dropped in both cases.
pub async fn submit(
    transport: &dyn ChatTransport,
    request: &ChatRequest,
    deadline: Option<Duration>,
    cancel: &CancellationToken,
) -> crate::Result<RawMessage> {
    let call = async {
        match deadline {
            Some(limit) => match tokio::time::timeout(limit, transport.complete(request)).await {
                Ok(result) => result,
                Err(_) => Err(Error::timeout("model transport", limit)),
            },
            None => transport.complete(request).await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled("cancelled while awaiting the model".into())),
        result = call => result,
    }
}
