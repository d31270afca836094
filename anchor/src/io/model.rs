//! Model client abstraction and the OpenAI-compatible HTTP backend.
//!
//! The [`ModelClient`] trait decouples the loop from the provider. Tests use
//! scripted clients that return predetermined replies without network access.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::core::types::{Message, Role, ToolCall};
use crate::io::config::LlmConfig;
use crate::io::wait::Interrupted;
use crate::tools::ToolSchema;

/// Errors from model calls.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP 429. `retry_after` is the provider's hint in seconds, kept for
    /// logs only; [`crate::io::retry::RetryingModel`] follows its own fixed
    /// schedule.
    #[error("rate limited by the model provider")]
    RateLimited { retry_after: Option<u64> },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("missing API key: {0}")]
    MissingApiKey(String),

    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

impl ModelError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ModelError::RateLimited { .. })
    }
}

/// Everything the model sees for one call.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub tools: &'a [ToolSchema],
    pub max_tokens: u32,
}

/// Abstraction over model backends.
pub trait ModelClient {
    /// Return the next assistant message for the conversation.
    fn complete(&self, request: &ModelRequest<'_>) -> Result<Message, ModelError>;
}

impl<M: ModelClient + ?Sized> ModelClient for &M {
    fn complete(&self, request: &ModelRequest<'_>) -> Result<Message, ModelError> {
        (**self).complete(request)
    }
}

/// Client for `POST {base_url}/chat/completions` with function tools.
#[derive(Debug)]
pub struct ChatCompletionsClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl ChatCompletionsClient {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, ModelError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build a client from config, reading the API key from the configured env var.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ModelError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ModelError::MissingApiKey(format!("{} not set", config.api_key_env)))?;
        Self::new(
            api_key,
            config.base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl ModelClient for ChatCompletionsClient {
    #[instrument(skip_all, fields(model = request.model, messages = request.messages.len()))]
    fn complete(&self, request: &ModelRequest<'_>) -> Result<Message, ModelError> {
        let body = ChatRequest::from_request(request);
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            warn!(?retry_after, "model provider rate limited the request");
            return Err(ModelError::RateLimited { retry_after });
        }
        if status.is_client_error() || status.is_server_error() {
            let message = response.text().unwrap_or_else(|_| "(no body)".into());
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text()?;
        let message = parse_response(&text)?;
        debug!(tool_calls = message.tool_calls.len(), "model replied");
        Ok(message)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    max_tokens: u32,
}

impl<'a> ChatRequest<'a> {
    fn from_request(request: &ModelRequest<'a>) -> Self {
        let tools: Vec<WireTool<'a>> = request
            .tools
            .iter()
            .map(|schema| WireTool {
                kind: "function",
                function: WireFunctionDef {
                    name: schema.name,
                    description: schema.description,
                    parameters: &schema.parameters,
                },
            })
            .collect();
        Self {
            model: request.model,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            tool_choice: (!tools.is_empty()).then_some("auto"),
            tools,
            max_tokens: request.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(message: &'a Message) -> Self {
        // Providers reject an assistant turn with neither text nor tool calls.
        let content = match message.content.as_deref() {
            None if message.role == Role::Assistant && message.tool_calls.is_empty() => Some(""),
            other => other,
        };
        Self {
            role: message.role,
            content,
            tool_calls: message
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: &call.id,
                    kind: "function",
                    function: WireFunctionCall {
                        name: &call.name,
                        arguments: &call.arguments,
                    },
                })
                .collect(),
            tool_call_id: message.tool_call_id.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireToolCall<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionCall<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunctionCall<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionDef<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunctionDef<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    #[serde(default)]
    id: String,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Parse a chat-completions response body into an assistant message.
///
/// Arguments sent as JSON objects instead of strings are re-encoded; calls
/// without an id get a positional one so results can still be paired.
pub fn parse_response(body: &str) -> Result<Message, ModelError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ModelError::InvalidResponse(format!("failed to parse response: {e}")))?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::InvalidResponse("response has no choices".into()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, call)| {
            let id = if call.id.is_empty() {
                format!("call_{index}")
            } else {
                call.id
            };
            let arguments = match call.function.arguments {
                Value::String(raw) => raw,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            ToolCall::new(id, call.function.name, arguments)
        })
        .collect();

    Ok(Message::assistant(choice.message.content, tool_calls))
}
