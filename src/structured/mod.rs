//! Structured output: turn free-form model text into validated values.
//!
//! - [`locate_json`]: find a JSON value inside prose or markdown fences
//! - [`Extractor`]: locate + validate, with a bounded corrective retry driver
//! - [`ValidationFailure`]: field-level diagnostics shared with the schema adapter
//! - [`ResponseFormat`]: output-shape hint for transports with a JSON mode
//!
//! # Examples
//!
//! ```
//! use ai_fncall::schema::{FieldType, Schema};
//! use ai_fncall::structured::Extractor;
//! use serde_json::json;
//!
//! let schema = Schema::builder()
//!     .required("median", FieldType::Number, "Median value")
//!     .build();
//!
//! let value = Extractor::new(schema)
//!     .extract(r#"The answer is {"median": 70.5}"#)
//!     .unwrap();
//! assert_eq!(value, json!({"median": 70.5}));
//! ```

pub mod error;
pub mod extract;
pub mod locate;
pub mod response_format;

pub use error::{ValidationFailure, ValidationIssue};
pub use extract::{corrective_prompt, ExtractOptions, Extracted, Extractor, RetryPrompt};
pub use locate::locate_json;
pub use response_format::ResponseFormat;
