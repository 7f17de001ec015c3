//! OpenAI-compatible chat-completion client.
//!
//! Implements [`ChatModel`] over `POST {base_url}/chat/completions`, with
//! function-calling tool definitions. Works with OpenAI and with any local
//! server speaking the same protocol (Ollama, llama.cpp, vLLM).

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use docchat_core::llm::{
    ChatModel, Completion, CompletionRequest, Message, Role, ToolCall, ToolSpec,
};

use crate::config::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("OPENAI_API_KEY environment variable not set")]
    MissingApiKey,
}

pub struct OpenAIChatModel {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

fn is_local(base_url: &str) -> bool {
    base_url.contains("://localhost") || base_url.contains("://127.0.0.1")
}

impl OpenAIChatModel {
    /// Build a client from config, reading `OPENAI_API_KEY`.
    ///
    /// Local base URLs do not require a key.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var("OPENAI_API_KEY").ok();
        if api_key.is_none() && !is_local(&config.base_url) {
            return Err(LlmError::MissingApiKey);
        }
        Self::with_key(config, api_key)
    }

    pub fn with_key(config: &LlmConfig, api_key: Option<String>) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages_to_json(&request.messages),
            "temperature": request.temperature.unwrap_or(self.temperature),
            "max_tokens": self.max_tokens,
        });
        if !request.tools.is_empty() {
            body["tools"] = json!(tools_to_json(&request.tools));
        }
        body
    }

    async fn send(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(url = %url, model = %self.model, messages = request.messages.len(), "sending chat completion");

        let mut http = self.client.post(&url).json(&self.request_body(request));
        if let Some(key) = &self.api_key {
            http = http.header("Authorization", format!("Bearer {}", key));
        }
        let response = http.send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(map_http_error(status.as_u16(), &text));
        }

        let json: Value =
            serde_json::from_str(&text).map_err(|e| LlmError::Parse(format!("invalid JSON: {}", e)))?;
        parse_response(&json)
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> anyhow::Result<Completion> {
        Ok(self.send(&request).await?)
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

/// Convert messages to the OpenAI wire format.
fn messages_to_json(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| {
            let mut obj = json!({
                "role": role_str(msg.role),
                "content": msg.content,
            });
            if !msg.tool_calls.is_empty() {
                obj["tool_calls"] = msg
                    .tool_calls
                    .iter()
                    .map(|c| {
                        json!({
                            "id": c.id,
                            "type": "function",
                            "function": {
                                "name": c.name,
                                "arguments": c.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
            }
            if let Some(id) = &msg.tool_call_id {
                obj["tool_call_id"] = json!(id);
            }
            obj
        })
        .collect()
}

fn tools_to_json(tools: &[ToolSpec]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                }
            })
        })
        .collect()
}

fn parse_response(body: &Value) -> Result<Completion, LlmError> {
    let choice = body
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| LlmError::Parse("no choices in response".to_string()))?;
    let message = choice
        .get("message")
        .ok_or_else(|| LlmError::Parse("no message in choice".to_string()))?;

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|f| f.as_str())
        .map(|s| s.to_string());
    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .map(|s| s.to_string());

    let tool_calls: Vec<ToolCall> = message
        .get("tool_calls")
        .and_then(|t| t.as_array())
        .map(|calls| {
            calls
                .iter()
                .filter_map(|tc| {
                    let id = tc.get("id")?.as_str()?.to_string();
                    let func = tc.get("function")?;
                    let name = func.get("name")?.as_str()?.to_string();
                    let args_str = func.get("arguments").and_then(|a| a.as_str()).unwrap_or("{}");
                    let arguments: Value = serde_json::from_str(args_str).unwrap_or(json!({}));
                    Some(ToolCall {
                        id,
                        name,
                        arguments,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let message = if tool_calls.is_empty() {
        Message::assistant(content.unwrap_or_default())
    } else {
        Message::assistant_tool_calls(content, tool_calls)
    };

    Ok(Completion {
        message,
        finish_reason,
    })
}

/// Prefer the API's `error.message` over the raw body.
fn map_http_error(status: u16, body: &str) -> LlmError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error")?.get("message")?.as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| body.to_string());
    LlmError::Api { status, message }
}
