//! # ai-fncall
//!
//! 面向大语言模型的结构化函数调用层：带标签的消息模型、绑定 schema 的工具，以及带重试的对话循环。
//!
//! Structured function calling for language models. Expose schema-validated
//! tools to a model, drive the conversation until it produces a final answer,
//! and turn malformed model output into classified, correctable errors.
//!
//! ## Overview
//!
//! | Component | Module | Role |
//! |-----------|--------|------|
//! | Schema Adapter | [`schema`] | Schema → call spec; validate-and-coerce |
//! | Message Model | [`types`] | Seven tagged message variants, narrowing, predicates |
//! | Tool Binding | [`tool`] | Schema + implementation → callable tool |
//! | Structured Output | [`structured`] | Locate and validate JSON in free text, with retries |
//! | Agent Loop | [`chain`] | Bounded model/tool state machine |
//! | Transport | [`transport`] | The one model call the loop depends on |
//!
//! ## Error model
//!
//! Failures caused by model output (`Retryable`, `Parse`, `Validation`) are
//! turned into corrective conversation content and retried within a budget.
//! Everything else (timeouts, protocol violations, tool defects,
//! cancellation) is fatal. See [`Error::is_retryable`] and [`ErrorKind`].
//!
//! ## Quick Start
//!
//! ```rust
//! use ai_fncall::schema::{FieldType, Schema};
//! use ai_fncall::tool::{ToolBinding, ToolError, ToolRegistry};
//! use ai_fncall::transport::mock::MockTransport;
//! use ai_fncall::types::ToolCallRequest;
//! use ai_fncall::{Chain, Message};
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let schema = Schema::builder()
//!     .required("city", FieldType::String, "City name")
//!     .build();
//! let weather = ToolBinding::bind("get_weather", "Current weather", schema, |args: Value| async move {
//!     Ok::<_, ToolError>(json!({"city": args["city"], "temp_c": 21}))
//! })
//! .unwrap();
//! let registry = ToolRegistry::new().with(weather).unwrap();
//!
//! let transport = MockTransport::new()
//!     .push_tool_calls(vec![ToolCallRequest::new("call_1", "get_weather", r#"{"city":"Oslo"}"#)])
//!     .push_text("It is 21°C in Oslo.");
//!
//! let chain = Chain::new(Arc::new(transport), registry);
//! let outcome = chain
//!     .run(vec![Message::system("You answer weather questions."), Message::user("Weather in Oslo?")])
//!     .await;
//!
//! assert!(outcome.is_done());
//! assert_eq!(outcome.final_message().and_then(|m| m.content()), Some("It is 21°C in Oslo."));
//! # });
//! ```

pub mod chain;
pub mod config;
pub mod error;
pub mod error_code;
pub mod schema;
pub mod structured;
pub mod tool;
pub mod transport;
pub mod types;
pub mod utils;

pub use chain::{Chain, Conversation, RunOutcome, RunState};
pub use config::ChainConfig;
pub use error::{Error, ErrorContext, RunError};
pub use error_code::ErrorKind;
pub use schema::{to_call_spec, CallSpec, Schema};
pub use structured::{ExtractOptions, Extractor, ValidationFailure, ValidationIssue};
pub use tool::{ToolBinding, ToolError, ToolRegistry};
pub use transport::{ChatRequest, ChatTransport};
pub use types::{Message, MessageRole, RawMessage};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
