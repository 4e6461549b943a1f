//! OpenAI-compatible chat-completions transport.

use super::{ChatRequest, ChatTransport};
use crate::error::{Error, ErrorContext};
use crate::types::RawMessage;
use async_trait::async_trait;
use reqwest::{Proxy, StatusCode};
use std::env;
use std::time::Duration;
use tracing::debug;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const COMPLETIONS_PATH: &str = "chat/completions";

/// Posts the conversation to `{base_url}/chat/completions` and returns
/// `choices[0].message`.
///
/// Build it once and share it (e.g. behind an `Arc`); the inner client pools
/// connections.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: &str, model: impl Into<String>, api_key: Option<String>) -> crate::Result<Self> {
        let timeout_secs = env::var("AI_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        Self::with_timeout(base_url, model, api_key, Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(
        base_url: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> crate::Result<Self> {
        let endpoint = completions_url(base_url)?;

        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Ok(proxy_url) = env::var("AI_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder.build().map_err(|e| Error::Transport {
            message: format!("failed to build HTTP client: {}", e),
            status: None,
        })?;

        Ok(Self {
            client,
            endpoint,
            model: model.into(),
            api_key,
            timeout,
        })
    }

    /// Configure from `AI_FNCALL_BASE_URL`, `AI_FNCALL_MODEL` and
    /// `AI_FNCALL_API_KEY`.
    pub fn from_env() -> crate::Result<Self> {
        let base_url = env::var("AI_FNCALL_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = env::var("AI_FNCALL_MODEL").map_err(|_| {
            Error::configuration_with_context(
                "AI_FNCALL_MODEL is not set",
                ErrorContext::new().with_field_path("AI_FNCALL_MODEL").with_source("env"),
            )
        })?;
        let api_key = env::var("AI_FNCALL_API_KEY").ok().filter(|k| !k.is_empty());
        Self::new(&base_url, model, api_key)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn complete(&self, request: &ChatRequest) -> crate::Result<RawMessage> {
        let body = request.to_openai_body(&self.model);
        debug!(endpoint = %self.endpoint, messages = request.messages.len(), "posting chat completion");

        let mut req = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, self.timeout))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(map_status(status, &text));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| map_reqwest_error(e, self.timeout))?;
        let message = payload
            .pointer("/choices/0/message")
            .cloned()
            .ok_or_else(|| {
                Error::protocol_with_context(
                    "response has no choices[0].message",
                    ErrorContext::new()
                        .with_field_path("choices[0].message")
                        .with_source("http_transport"),
                )
            })?;

        serde_json::from_value(message).map_err(|e| {
            Error::protocol_with_context(
                format!("malformed response message: {}", e),
                ErrorContext::new()
                    .with_field_path("choices[0].message")
                    .with_source("http_transport"),
            )
        })
    }
}

fn completions_url(base_url: &str) -> crate::Result<Url> {
    let invalid = |reason: String| {
        Error::configuration_with_context(
            reason,
            ErrorContext::new().with_field_path("base_url").with_source("http_transport"),
        )
    };
    let mut base = Url::parse(base_url).map_err(|e| invalid(format!("invalid base URL '{}': {}", base_url, e)))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported URL scheme '{}'", base.scheme())));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(COMPLETIONS_PATH)
        .map_err(|e| invalid(format!("cannot build completions URL: {}", e)))
}

fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        return Error::timeout("http request", timeout);
    }
    Error::Transport {
        message: err.to_string(),
        status: err.status().map(|s| s.as_u16()),
    }
}

fn map_status(status: StatusCode, body: &str) -> Error {
    match status {
        // Deadline enforced upstream; the limit is unknown here.
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Error::Timeout {
            operation: format!("upstream (HTTP {})", status.as_u16()),
            timeout_ms: 0,
        },
        _ => Error::Transport {
            message: format!("HTTP {}: {}", status.as_u16(), body.chars().take(300).collect::<String>()),
            status: Some(status.as_u16()),
        },
    }
}
