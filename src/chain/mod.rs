//! 对话循环：驱动模型调用、工具分发与结果回填，直到得到最终答案。
//!
//! # Chain / Agent Loop
//!
//! A [`Chain`] advances one conversation per [`run`](Chain::run):
//!
//! 1. `AwaitingModel`: submit the conversation and the registry's call specs,
//!    narrow the response. An Assistant message ends the run; a call request
//!    moves to dispatch; anything else fails the run.
//! 2. `DispatchingTools`: run every call of the batch (concurrently unless
//!    disabled), then append the results in call order, each tagged with its
//!    call id. Model-correctable failures become error payloads in the result
//!    content; anything else fails the run.
//!
//! Each batch containing a correctable failure, and each rejected final
//! answer when an output schema is set, costs one retry. Exceeding
//! `max_retries` or `max_iterations` fails the run with an
//! [`Error::Exhausted`] error.
//!
//! The run never returns `Err`: failures come back as a [`RunError`] inside
//! [`RunOutcome`], together with the partial conversation.

pub mod conversation;
mod dispatch;
pub mod state;

pub use conversation::Conversation;
pub use state::RunState;

use crate::config::ChainConfig;
use crate::error::{Error, ErrorContext, RunError};
use crate::schema::Schema;
use crate::structured::Extractor;
use crate::tool::ToolRegistry;
use crate::transport::{submit, ChatRequest, ChatTransport};
use crate::types::Message;
use dispatch::{dispatch_batch, PendingCall};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Result of one run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    /// Full conversation on success, the partial one on failure
    pub conversation: Vec<Message>,
    /// Model submissions made
    pub iterations: u32,
    /// Corrective resubmissions made
    pub retries: u32,
    /// Final Assistant message or the classified failure
    pub result: Result<Message, RunError>,
    /// Validated final answer, when the chain has an output schema
    pub output: Option<Value>,
    pub final_state: RunState,
}

impl RunOutcome {
    pub fn is_done(&self) -> bool {
        self.final_state == RunState::Done
    }

    pub fn final_message(&self) -> Option<&Message> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&RunError> {
        self.result.as_ref().err()
    }
}

/// Bounded model/tool conversation driver.
///
/// Holds only shared, read-only collaborators, so one `Chain` can serve many
/// concurrent runs.
#[derive(Clone)]
pub struct Chain {
    transport: Arc<dyn ChatTransport>,
    registry: ToolRegistry,
    config: ChainConfig,
    output: Option<Extractor>,
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("tools", &self.registry.names())
            .field("config", &self.config)
            .field("output", &self.output.is_some())
            .finish_non_exhaustive()
    }
}

/// Mutable state of one run.
struct RunContext {
    conversation: Conversation,
    state: RunState,
    iterations: u32,
    retries: u32,
    output: Option<Value>,
}

impl RunContext {
    /// Move to `next`; an illegal transition is logged and ignored.
    fn transition(&mut self, next: RunState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "illegal state transition ignored");
            return false;
        }
        debug!(from = %self.state, to = %next, "state transition");
        self.state = next;
        true
    }
}

impl Chain {
    pub fn new(transport: Arc<dyn ChatTransport>, registry: ToolRegistry) -> Self {
        Self {
            transport,
            registry,
            config: ChainConfig::default(),
            output: None,
        }
    }

    pub fn with_config(mut self, config: ChainConfig) -> Self {
        self.config = config;
        self
    }

    /// Require the final answer to satisfy `schema`.
    pub fn with_output_schema(self, schema: Schema) -> Self {
        self.with_extractor(Extractor::new(schema))
    }

    /// Like [`with_output_schema`](Self::with_output_schema) with a custom
    /// corrective prompt. The extractor's own attempt budget is not used; the
    /// chain's `max_retries` applies.
    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.output = Some(extractor);
        self
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn run(&self, seed: Vec<Message>) -> RunOutcome {
        self.run_with_cancel(seed, CancellationToken::new()).await
    }

    /// Run until a final answer, a fatal error, a spent budget, or `cancel`.
    pub async fn run_with_cancel(&self, seed: Vec<Message>, cancel: CancellationToken) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("chain_run", %run_id);
        self.drive(run_id, seed, cancel).instrument(span).await
    }

    async fn drive(&self, run_id: Uuid, seed: Vec<Message>, cancel: CancellationToken) -> RunOutcome {
        let seed_copy = seed.clone();
        let mut ctx = RunContext {
            conversation: Conversation::new(),
            state: RunState::AwaitingModel,
            iterations: 0,
            retries: 0,
            output: None,
        };

        let setup = self
            .config
            .validate()
            .and_then(|_| Conversation::from_messages(seed));
        match setup {
            Ok(conversation) => ctx.conversation = conversation,
            Err(err) => {
                let mut outcome = self.fail(run_id, ctx, err);
                outcome.conversation = seed_copy;
                return outcome;
            }
        }

        info!(
            tools = self.registry.len(),
            max_iterations = self.config.max_iterations,
            "run started"
        );

        while ctx.state != RunState::Done {
            let step = match ctx.state {
                RunState::DispatchingTools => self.dispatch_tools(&mut ctx, &cancel).await,
                _ => self.await_model(&mut ctx, &cancel).await,
            };
            if let Err(err) = step {
                return self.fail(run_id, ctx, err);
            }
        }
        self.finish(run_id, ctx)
    }

    async fn await_model(&self, ctx: &mut RunContext, cancel: &CancellationToken) -> crate::Result<()> {
        if ctx.iterations >= self.config.max_iterations {
            return Err(Error::exhausted(
                ctx.iterations,
                Error::retryable(format!(
                    "no final answer within {} iterations",
                    self.config.max_iterations
                )),
            ));
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled("run cancelled".into()));
        }

        ctx.iterations += 1;
        let mut request = ChatRequest::new(ctx.conversation.messages().to_vec())
            .with_tools(self.registry.call_specs());
        if let Some(extractor) = &self.output {
            request = request.with_response_format(extractor.response_format());
        }

        debug!(iteration = ctx.iterations, messages = request.messages.len(), "submitting to model");
        let raw = submit(
            self.transport.as_ref(),
            &request,
            Some(self.config.call_deadline()),
            cancel,
        )
        .await?;
        let response = Message::narrow(raw)?;

        if response.is_call_request() {
            ctx.conversation.push(response)?;
            ctx.transition(RunState::DispatchingTools);
            return Ok(());
        }

        let text = match &response {
            Message::Assistant { content, .. } => content.clone(),
            other => {
                return Err(Error::protocol_with_context(
                    format!("model responded with a {} message", other.role().as_str()),
                    ErrorContext::new().with_field_path("role").with_source("chain"),
                ))
            }
        };
        ctx.conversation.push(response)?;

        let Some(extractor) = &self.output else {
            ctx.transition(RunState::Done);
            return Ok(());
        };

        match extractor.extract(&text) {
            Ok(value) => {
                ctx.output = Some(value);
                ctx.transition(RunState::Done);
                Ok(())
            }
            Err(err) => {
                if !err.is_retryable() {
                    return Err(err);
                }
                if !self.spend_retry(ctx) {
                    return Err(Error::exhausted(ctx.retries, err));
                }
                warn!(
                    iteration = ctx.iterations,
                    retries = ctx.retries,
                    error_kind = err.kind().name(),
                    "final answer rejected: {}",
                    err
                );
                let correction = extractor.retry_prompt(&err);
                ctx.conversation.push(self.user_message(correction))?;
                ctx.transition(RunState::AwaitingModel);
                Ok(())
            }
        }
    }

    async fn dispatch_tools(&self, ctx: &mut RunContext, cancel: &CancellationToken) -> crate::Result<()> {
        let calls = ctx
            .conversation
            .last()
            .map(PendingCall::from_message)
            .unwrap_or_default();

        let dispatched = dispatch_batch(
            &self.registry,
            calls,
            self.config.parallel_tools,
            self.config.tool_deadline(),
            cancel,
        )
        .await;

        let mut results = Vec::with_capacity(dispatched.len());
        let mut last_retryable: Option<Error> = None;
        for item in dispatched {
            let content = match item.outcome {
                Ok(value) => render_result(value),
                Err(err) if err.is_retryable() => {
                    warn!(
                        tool = %item.call.name,
                        call_id = %item.call.id,
                        error_kind = err.kind().name(),
                        "tool call rejected: {}",
                        err
                    );
                    let payload = error_payload(&err);
                    last_retryable = Some(err);
                    payload
                }
                // Nothing from this batch is appended.
                Err(err) => return Err(err),
            };
            results.push(item.call.result_message(content));
        }

        for result in results {
            ctx.conversation.push(result)?;
        }

        if let Some(err) = last_retryable {
            if !self.spend_retry(ctx) {
                return Err(Error::exhausted(ctx.retries, err));
            }
        }

        ctx.transition(RunState::AwaitingModel);
        Ok(())
    }

    /// Count one corrective resubmission; false once the budget is spent.
    fn spend_retry(&self, ctx: &mut RunContext) -> bool {
        ctx.retries += 1;
        ctx.retries <= self.config.max_retries
    }

    fn user_message(&self, text: String) -> Message {
        if self.config.normalize_content {
            Message::user(text)
        } else {
            Message::user_exact(text)
        }
    }

    fn finish(&self, run_id: Uuid, ctx: RunContext) -> RunOutcome {
        let final_message = ctx.conversation.last().cloned();
        info!(iterations = ctx.iterations, retries = ctx.retries, "run finished");
        let result = final_message.ok_or_else(|| {
            RunError::from(Error::protocol_with_context(
                "run finished without a final message",
                ErrorContext::new().with_source("chain"),
            ))
        });
        RunOutcome {
            run_id,
            conversation: ctx.conversation.into_messages(),
            iterations: ctx.iterations,
            retries: ctx.retries,
            result,
            output: ctx.output,
            final_state: RunState::Done,
        }
    }

    fn fail(&self, run_id: Uuid, mut ctx: RunContext, err: Error) -> RunOutcome {
        ctx.transition(RunState::Failed);
        warn!(
            iterations = ctx.iterations,
            retries = ctx.retries,
            error_kind = err.kind().name(),
            "run failed: {}",
            err
        );
        RunOutcome {
            run_id,
            conversation: ctx.conversation.into_messages(),
            iterations: ctx.iterations,
            retries: ctx.retries,
            result: Err(RunError::from(&err)),
            output: None,
            final_state: RunState::Failed,
        }
    }
}

/// Tool output as message content: strings verbatim, anything else as JSON.
fn render_result(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Error payload placed in a result message so the model can self-correct.
fn error_payload(err: &Error) -> String {
    serde_json::json!({ "error": RunError::from(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(state: RunState) -> RunContext {
        RunContext {
            conversation: Conversation::new(),
            state,
            iterations: 0,
            retries: 0,
            output: None,
        }
    }

    #[test]
    fn test_illegal_transition_keeps_state() {
        let mut ctx = context(RunState::Done);
        assert!(!ctx.transition(RunState::DispatchingTools));
        assert_eq!(ctx.state, RunState::Done);

        let mut ctx = context(RunState::DispatchingTools);
        assert!(!ctx.transition(RunState::Done));
        assert_eq!(ctx.state, RunState::DispatchingTools);
        assert!(ctx.transition(RunState::AwaitingModel));
        assert_eq!(ctx.state, RunState::AwaitingModel);
    }
}
