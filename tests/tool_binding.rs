//! Binding schemas to implementations and invoking them

use ai_fncall::schema::{FieldType, Schema};
use ai_fncall::tool::{ToolBinding, ToolError, ToolInput, ToolRegistry};
use ai_fncall::types::{FunctionCall, ToolCallRequest};
use ai_fncall::{Error, ErrorKind, Message};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

fn convert_tool() -> ToolBinding {
    let schema = Schema::builder()
        .required("amount", FieldType::Number, "Amount to convert")
        .required("to", FieldType::Enum(vec!["EUR".into(), "USD".into()]), "Target currency")
        .build();
    ToolBinding::bind("convert", "Convert NOK", schema, |args: Value| async move {
        let amount = args["amount"].as_f64().unwrap_or_default();
        if amount < 0.0 {
            return Err(ToolError::retryable("amount must not be negative"));
        }
        Ok(json!({"converted": amount / 10.0, "currency": args["to"]}))
    })
    .unwrap()
}

#[tokio::test]
async fn test_invoke_with_raw_arguments() {
    let tool = convert_tool();
    let result = tool.invoke(r#"{"amount": "100", "to": "EUR"}"#).await.unwrap();
    assert_eq!(result, json!({"converted": 10.0, "currency": "EUR"}));
}

#[tokio::test]
async fn test_invoke_with_call_message() {
    let tool = convert_tool();
    let message = Message::tool_call(vec![
        ToolCallRequest::new("c1", "other", "{}"),
        ToolCallRequest::new("c2", "convert", r#"{"amount": 50, "to": "USD"}"#),
        ToolCallRequest::new("c3", "convert", r#"{"amount": 20, "to": "EUR"}"#),
    ])
    .unwrap();

    // Without an id the first entry naming the tool is used
    let first = tool.invoke(&message).await.unwrap();
    assert_eq!(first["currency"], "USD");

    let chosen = tool.invoke(ToolInput::call(&message, "c3")).await.unwrap();
    assert_eq!(chosen["converted"], json!(2.0));

    let err = tool.parse_input(ToolInput::call(&message, "c9")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[tokio::test]
async fn test_invoke_with_legacy_function_call() {
    let tool = convert_tool();
    let message = Message::function_call(FunctionCall::new("convert", r#"{"amount": 10, "to": "EUR"}"#));
    assert_eq!(tool.invoke(&message).await.unwrap()["converted"], json!(1.0));

    let wrong = Message::function_call(FunctionCall::new("other", "{}"));
    assert!(matches!(tool.parse_input(&wrong), Err(Error::Protocol { .. })));
}

#[test]
fn test_malformed_arguments_are_parse_errors() {
    let err = convert_tool().parse_input(r#"{"amount": 5,"#).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseError);
    assert!(err.is_retryable());
}

#[test]
fn test_schema_violations_list_each_field() {
    let err = convert_tool()
        .parse_input(r#"{"amount": "lots", "to": "GBP"}"#)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    let paths: Vec<&str> = err
        .validation_failure()
        .unwrap()
        .issues()
        .iter()
        .map(|i| i.path.as_str())
        .collect();
    assert_eq!(paths, vec!["amount", "to"]);
}

#[test]
fn test_empty_arguments_mean_empty_object() {
    let ping = ToolBinding::bind("ping", "Ping", Schema::builder().build(), |_args: Value| async move {
        Ok::<_, ToolError>("pong")
    })
    .unwrap();
    assert_eq!(ping.parse_input("").unwrap(), json!({}));
}

#[tokio::test]
async fn test_tool_errors_are_classified() {
    let tool = convert_tool();
    let err = tool.invoke(r#"{"amount": -1, "to": "EUR"}"#).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Retryable);
    assert!(err.is_retryable());

    let failing = ToolBinding::bind("fail", "Fails", Schema::builder().build(), |_args: Value| async move {
        Err::<Value, _>(ToolError::from(anyhow::anyhow!("disk full")))
    })
    .unwrap();
    let err = failing.invoke("{}").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Implementation);
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("disk full"));
}

#[derive(Debug, Deserialize, JsonSchema)]
struct Lookup {
    /// Station identifier
    station: String,
    #[serde(default)]
    days: Option<u32>,
}

#[tokio::test]
async fn test_typed_binding_derives_spec_and_decodes() {
    let tool = ToolBinding::typed("lookup", "Station lookup", |input: Lookup| async move {
        Ok::<_, ToolError>(format!("{} for {} days", input.station, input.days.unwrap_or(1)))
    })
    .unwrap();

    let params = &tool.spec().parameters;
    assert_eq!(params["required"], json!(["station"]));
    assert_eq!(params["properties"]["station"]["description"], "Station identifier");

    let result = tool.invoke(r#"{"station": "OSL", "days": "3"}"#).await.unwrap();
    assert_eq!(result, json!("OSL for 3 days"));
}

#[test]
fn test_invalid_tool_name_is_rejected() {
    let err = ToolBinding::bind("not a name!", "bad", Schema::builder().build(), |_args: Value| async move {
        Ok::<_, ToolError>(Value::Null)
    })
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
}

#[test]
fn test_registry_rejects_duplicates_and_keeps_order() {
    let mut registry = ToolRegistry::new();
    registry.register(convert_tool()).unwrap();
    let err = registry.register(convert_tool()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let ping = ToolBinding::bind("ping", "Ping", Schema::builder().build(), |_args: Value| async move {
        Ok::<_, ToolError>("pong")
    })
    .unwrap();
    registry.register(ping).unwrap();

    assert_eq!(registry.names(), vec!["convert", "ping"]);
    assert_eq!(registry.call_specs()[1].name, "ping");
    assert!(registry.contains("convert"));
    assert!(registry.get("missing").is_none());
}
