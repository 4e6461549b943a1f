//! 工具绑定：将 schema 与实现绑定为可供模型调用的工具。
//!
//! # Tool Binding
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ToolBinding`] | Schema + derived call spec + implementation |
//! | [`ToolRegistry`] | Name-indexed bindings, registered explicitly at setup |
//! | [`ToolInput`] | Raw argument string or a call-request message |
//! | [`ToolError`] | Retryable vs fatal implementation failures |
//!
//! ## Example
//!
//! ```rust
//! use ai_fncall::schema::{FieldType, Schema};
//! use ai_fncall::tool::{ToolBinding, ToolError, ToolRegistry};
//! use serde_json::{json, Value};
//!
//! # tokio_test::block_on(async {
//! let schema = Schema::builder()
//!     .required("city", FieldType::String, "City name")
//!     .build();
//! let weather = ToolBinding::bind("get_weather", "Current weather", schema, |args: Value| async move {
//!     Ok::<_, ToolError>(json!({"city": args["city"], "temp_c": 21}))
//! })
//! .unwrap();
//!
//! let registry = ToolRegistry::new().with(weather).unwrap();
//! let tool = registry.get("get_weather").unwrap();
//! let result = tool.invoke(r#"{"city": "Oslo"}"#).await.unwrap();
//! assert_eq!(result["temp_c"], 21);
//! # });
//! ```

pub mod binding;
pub mod error;
pub mod registry;

pub use binding::{ToolBinding, ToolHandler, ToolInput};
pub use error::ToolError;
pub use registry::ToolRegistry;
