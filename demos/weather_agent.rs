//! Weather Agent Example
//!
//! Runs a two-tool agent loop end to end:
//! 1. Bind `get_weather` (typed input) and `convert_temperature` (builder schema)
//! 2. Drive the conversation until the model answers
//! 3. Print the transcript and the run summary
//!
//! Without configuration the model is simulated by a scripted transport, so
//! the example runs offline. To talk to a real OpenAI-compatible endpoint:
//!
//!   AI_FNCALL_MODEL=gpt-4o-mini AI_FNCALL_API_KEY=sk-... cargo run --example weather_agent
//!
//! Log verbosity follows `RUST_LOG` (e.g. `RUST_LOG=ai_fncall=debug`).

use ai_fncall::schema::{FieldType, Schema};
use ai_fncall::tool::{ToolBinding, ToolError, ToolRegistry};
use ai_fncall::transport::http::HttpTransport;
use ai_fncall::transport::mock::MockTransport;
use ai_fncall::types::ToolCallRequest;
use ai_fncall::{Chain, ChainConfig, ChatTransport, Message};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize, JsonSchema)]
struct WeatherQuery {
    /// City to look up, e.g. "Oslo"
    city: String,
}

fn weather_tool() -> ai_fncall::Result<ToolBinding> {
    ToolBinding::typed(
        "get_weather",
        "Current weather for a city, temperatures in Celsius",
        |query: WeatherQuery| async move {
            let temp_c = match query.city.to_lowercase().as_str() {
                "oslo" => 4.0,
                "lisbon" => 19.5,
                "tokyo" => 12.0,
                _ => return Err(ToolError::retryable(format!("no station for '{}'", query.city))),
            };
            Ok(json!({"city": query.city, "temp_c": temp_c, "sky": "overcast"}))
        },
    )
}

fn convert_tool() -> ai_fncall::Result<ToolBinding> {
    let schema = Schema::builder()
        .required("celsius", FieldType::Number, "Temperature in Celsius")
        .build();
    ToolBinding::bind(
        "convert_temperature",
        "Convert Celsius to Fahrenheit",
        schema,
        |args: Value| async move {
            let celsius = args["celsius"].as_f64().unwrap_or_default();
            Ok::<_, ToolError>(json!({"fahrenheit": celsius * 9.0 / 5.0 + 32.0}))
        },
    )
}

/// Scripted stand-in for a model: one call to each tool, then an answer.
fn simulated_model() -> MockTransport {
    MockTransport::new()
        .push_tool_calls(vec![ToolCallRequest::new(
            "call_weather",
            "get_weather",
            r#"{"city": "Oslo"}"#,
        )])
        .push_tool_calls(vec![ToolCallRequest::new(
            "call_convert",
            "convert_temperature",
            r#"{"celsius": "4"}"#,
        )])
        .push_text("It is 4°C (39.2°F) and overcast in Oslo.")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ai_fncall=info")),
        )
        .init();

    let registry = ToolRegistry::new().with(weather_tool()?)?.with(convert_tool()?)?;

    let transport: Arc<dyn ChatTransport> = if std::env::var("AI_FNCALL_MODEL").is_ok() {
        println!("Using HTTP transport");
        Arc::new(HttpTransport::from_env()?)
    } else {
        println!("AI_FNCALL_MODEL not set, using the simulated model");
        Arc::new(simulated_model())
    };

    let config = ChainConfig::default().max_iterations(6).with_env_overrides();
    let chain = Chain::new(transport, registry).with_config(config);

    let outcome = chain
        .run(vec![
            Message::system("You are a weather assistant. Use the tools; report both units."),
            Message::user("How warm is it in Oslo right now?"),
        ])
        .await;

    println!("\n--- transcript ({}) ---", outcome.run_id);
    for message in &outcome.conversation {
        match message {
            Message::ToolCall { calls, .. } => {
                for call in calls {
                    println!("[assistant -> {}] {}", call.name(), call.arguments());
                }
            }
            Message::ToolResult { tool_call_id, content } => {
                println!("[tool {}] {}", tool_call_id, content)
            }
            other => println!(
                "[{}] {}",
                other.role().as_str(),
                other.content().unwrap_or_default()
            ),
        }
    }

    println!(
        "\nstate: {}, iterations: {}, retries: {}",
        outcome.final_state, outcome.iterations, outcome.retries
    );
    if let Some(err) = outcome.error() {
        println!("error: {}", err);
    }

    Ok(())
}
