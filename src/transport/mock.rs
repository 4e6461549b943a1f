//! Scripted transport for tests and demos.

use super::{ChatRequest, ChatTransport};
use crate::error::Error;
use crate::types::{FunctionCall, RawMessage, ToolCallRequest};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Returns queued responses in order and records every request.
///
/// Once the script runs out, further calls fail with a transport error.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<crate::Result<RawMessage>>>,
    requests: Mutex<Vec<ChatRequest>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before answering (for deadline tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_raw(self, raw: RawMessage) -> Self {
        self.push_result(Ok(raw))
    }

    pub fn push_text(self, text: impl Into<String>) -> Self {
        self.push_raw(RawMessage::assistant(text))
    }

    pub fn push_tool_calls(self, calls: Vec<ToolCallRequest>) -> Self {
        self.push_raw(RawMessage::tool_calls(calls))
    }

    pub fn push_function_call(self, name: &str, arguments: &str) -> Self {
        self.push_raw(RawMessage::function_call(FunctionCall::new(name, arguments)))
    }

    pub fn push_error(self, error: Error) -> Self {
        self.push_result(Err(error))
    }

    fn push_result(self, result: crate::Result<RawMessage>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(result);
        }
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Scripted responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn complete(&self, request: &ChatRequest) -> crate::Result<RawMessage> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| {
            Err(Error::Transport {
                message: "mock transport has no scripted response left".into(),
                status: None,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    #[tokio::test]
    async fn test_replays_in_order_and_records() {
        let mock = MockTransport::new().push_text("one").push_text("two");
        let request = ChatRequest::new(vec![Message::user("hi")]);

        assert_eq!(mock.complete(&request).await.unwrap().content.as_deref(), Some("one"));
        assert_eq!(mock.complete(&request).await.unwrap().content.as_deref(), Some("two"));
        assert!(matches!(
            mock.complete(&request).await,
            Err(Error::Transport { .. })
        ));
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.requests()[0], request);
    }
}
