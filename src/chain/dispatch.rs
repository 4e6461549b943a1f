//! Dispatch of one batch of call requests.

use crate::error::{Error, ErrorContext};
use crate::tool::{ToolInput, ToolRegistry};
use crate::types::Message;
use futures::{stream, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One requested call, whichever wire form it came in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingCall {
    /// Correlation id; the function name for legacy calls
    pub id: String,
    pub name: String,
    pub arguments: String,
    pub legacy: bool,
}

impl PendingCall {
    /// Calls carried by a request message, in order.
    pub fn from_message(message: &Message) -> Vec<PendingCall> {
        match message {
            Message::ToolCall { calls, .. } => calls
                .iter()
                .map(|c| PendingCall {
                    id: c.id.clone(),
                    name: c.name().to_string(),
                    arguments: c.arguments().to_string(),
                    legacy: false,
                })
                .collect(),
            Message::FunctionCall { call, .. } => vec![PendingCall {
                id: call.name.clone(),
                name: call.name.clone(),
                arguments: call.arguments.clone(),
                legacy: true,
            }],
            _ => Vec::new(),
        }
    }

    /// Wrap a result payload into the matching result message.
    pub fn result_message(&self, content: String) -> Message {
        if self.legacy {
            Message::function_result(self.name.clone(), content)
        } else {
            Message::tool_result(self.id.clone(), content)
        }
    }
}

/// Outcome of one call, kept next to the call that produced it.
#[derive(Debug)]
pub(crate) struct Dispatched {
    pub call: PendingCall,
    pub outcome: crate::Result<Value>,
}

/// Run every call of a batch and return outcomes in call order.
///
/// In parallel mode all calls run concurrently and are re-sorted by position
/// once complete; the first fatal outcome to arrive drops the calls still in
/// flight. Sequential mode stops at the first fatal error so later calls do
/// not run.
pub(crate) async fn dispatch_batch(
    registry: &ToolRegistry,
    calls: Vec<PendingCall>,
    parallel: bool,
    tool_timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> Vec<Dispatched> {
    let call_count = calls.len();

    if parallel && call_count > 1 {
        let mut pending = stream::iter(calls.into_iter().enumerate())
            .map(|(position, call)| async move {
                let outcome = run_one(registry, &call, tool_timeout, cancel).await;
                (position, Dispatched { call, outcome })
            })
            .buffer_unordered(call_count);

        let mut indexed: Vec<(usize, Dispatched)> = Vec::with_capacity(call_count);
        while let Some((position, item)) = pending.next().await {
            let fatal = matches!(&item.outcome, Err(e) if !e.is_retryable());
            indexed.push((position, item));
            if fatal {
                debug!(
                    completed = indexed.len(),
                    total = call_count,
                    "fatal tool outcome, dropping the rest of the batch"
                );
                break;
            }
        }
        indexed.sort_by_key(|(position, _)| *position);
        indexed.into_iter().map(|(_, d)| d).collect()
    } else {
        let mut out = Vec::with_capacity(call_count);
        for call in calls {
            let outcome = run_one(registry, &call, tool_timeout, cancel).await;
            let fatal = matches!(&outcome, Err(e) if !e.is_retryable());
            out.push(Dispatched { call, outcome });
            if fatal {
                break;
            }
        }
        out
    }
}

async fn run_one(
    registry: &ToolRegistry,
    call: &PendingCall,
    tool_timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> crate::Result<Value> {
    let Some(binding) = registry.get(&call.name) else {
        return Err(Error::Retryable {
            message: format!("unknown tool '{}'", call.name),
            context: ErrorContext::new()
                .with_details(format!("available tools: {}", registry.names().join(", ")))
                .with_source("dispatch"),
        });
    };

    debug!(tool = %call.name, call_id = %call.id, "invoking tool");
    let invocation = async {
        let input = ToolInput::Raw(&call.arguments);
        match tool_timeout {
            Some(limit) => match tokio::time::timeout(limit, binding.invoke(input)).await {
                Ok(result) => result,
                Err(_) => Err(Error::timeout(format!("tool '{}'", call.name), limit)),
            },
            None => binding.invoke(input).await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled(format!("cancelled while running tool '{}'", call.name))),
        result = invocation => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldType, Schema};
    use crate::tool::{ToolBinding, ToolError};
    use crate::types::ToolCallRequest;
    use serde_json::json;

    fn sleeper() -> ToolRegistry {
        let schema = Schema::builder()
            .required("ms", FieldType::Integer, "sleep time")
            .build();
        let tool = ToolBinding::bind("sleep", "Sleep then echo", schema, |args: Value| async move {
            let ms = args["ms"].as_u64().unwrap_or_default();
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok::<_, ToolError>(ms)
        })
        .unwrap();
        ToolRegistry::new().with(tool).unwrap()
    }

    fn calls(specs: &[(&str, &str, &str)]) -> Vec<PendingCall> {
        let message = Message::tool_call(
            specs
                .iter()
                .map(|(id, name, args)| ToolCallRequest::new(*id, *name, *args))
                .collect(),
        )
        .unwrap();
        PendingCall::from_message(&message)
    }

    #[tokio::test]
    async fn test_parallel_results_keep_call_order() {
        let registry = sleeper();
        let batch = calls(&[
            ("slow", "sleep", r#"{"ms": 40}"#),
            ("fast", "sleep", r#"{"ms": 1}"#),
        ]);
        let out = dispatch_batch(&registry, batch, true, None, &CancellationToken::new()).await;
        let ids: Vec<_> = out.iter().map(|d| d.call.id.as_str()).collect();
        assert_eq!(ids, vec!["slow", "fast"]);
        assert_eq!(out[0].outcome.as_ref().unwrap(), &json!(40));
    }

    #[tokio::test]
    async fn test_parallel_fatal_drops_siblings() {
        let registry = sleeper();
        let started = std::time::Instant::now();
        let out = dispatch_batch(
            &registry,
            calls(&[("long", "sleep", r#"{"ms": 2000}"#), ("short", "sleep", r#"{"ms": 500}"#)]),
            true,
            Some(Duration::from_millis(20)),
            &CancellationToken::new(),
        )
        .await;
        assert!(started.elapsed() < Duration::from_millis(400));
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0].outcome, Err(Error::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_retryable() {
        let registry = sleeper();
        let out = dispatch_batch(
            &registry,
            calls(&[("c1", "foo", "{}")]),
            false,
            None,
            &CancellationToken::new(),
        )
        .await;
        let err = out[0].outcome.as_ref().unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("unknown tool 'foo'"));
    }

    #[tokio::test]
    async fn test_tool_timeout_is_fatal() {
        let registry = sleeper();
        let out = dispatch_batch(
            &registry,
            calls(&[("c1", "sleep", r#"{"ms": 200}"#), ("c2", "sleep", r#"{"ms": 1}"#)]),
            false,
            Some(Duration::from_millis(10)),
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0].outcome, Err(Error::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_batch() {
        let registry = sleeper();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out = dispatch_batch(
            &registry,
            calls(&[("c1", "sleep", r#"{"ms": 1}"#)]),
            true,
            None,
            &cancel,
        )
        .await;
        assert!(matches!(out[0].outcome, Err(Error::Cancelled(_))));
    }

    #[test]
    fn test_legacy_call_correlates_by_name() {
        let message = Message::function_call(crate::types::FunctionCall::new("sum", "{}"));
        let pending = PendingCall::from_message(&message);
        assert_eq!(pending[0].id, "sum");
        assert!(pending[0].result_message("3".into()).is_function_result());
    }
}
