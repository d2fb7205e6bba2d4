//! Gemini provider
//!
//! Talks to Gemini's OpenAI-compatible chat completions endpoint. Tool calls
//! are deserialized leniently because the `type` field is occasionally
//! omitted in intermediate responses.

use super::{ChatResponse, LlmError, Message, ToolCall, ToolCallFunction, ToolDefinition};
use crate::config::{AGENT_TEMPERATURE, HTTP_TIMEOUT_SECS};
use reqwest::Client as HttpClient;
use serde_json::json;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// LLM provider implementation for Gemini
pub struct GeminiProvider {
    http_client: HttpClient,
    api_key: String,
    base_url: String,
}

#[derive(serde::Deserialize, Debug)]
struct LenientToolCallFunction {
    name: String,
    arguments: String,
}

#[derive(serde::Deserialize, Debug)]
struct LenientToolCall {
    id: String,
    #[serde(rename = "type")]
    _type: Option<String>,
    function: LenientToolCallFunction,
}

#[derive(serde::Deserialize, Debug)]
struct LenientMessage {
    content: Option<String>,
    tool_calls: Option<Vec<LenientToolCall>>,
}

#[derive(serde::Deserialize, Debug)]
struct LenientChoice {
    message: LenientMessage,
    finish_reason: Option<String>,
}

#[derive(serde::Deserialize, Debug)]
struct LenientResponse {
    choices: Vec<LenientChoice>,
}

impl GeminiProvider {
    /// Create a new Gemini provider instance
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Create a provider pointing at a custom base URL (used by tests)
    #[must_use]
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            base_url,
        }
    }

    /// Convert the conversation into OpenAI-compatible wire messages
    fn prepare_messages(system_prompt: &str, history: &[Message]) -> Vec<serde_json::Value> {
        let mut messages = vec![json!({
            "role": "system",
            "content": system_prompt
        })];

        for msg in history {
            match msg.role.as_str() {
                "tool" => messages.push(json!({
                    "role": "tool",
                    "tool_call_id": msg.tool_call_id,
                    "content": msg.content
                })),
                "assistant" if msg.tool_calls.is_some() => {
                    let calls: Vec<serde_json::Value> = msg
                        .tool_calls
                        .iter()
                        .flatten()
                        .map(|c| {
                            json!({
                                "id": c.id,
                                "type": "function",
                                "function": {
                                    "name": c.function.name,
                                    "arguments": c.function.arguments
                                }
                            })
                        })
                        .collect();
                    messages.push(json!({
                        "role": "assistant",
                        "content": msg.content,
                        "tool_calls": calls
                    }));
                }
                role => messages.push(json!({
                    "role": role,
                    "content": msg.content
                })),
            }
        }

        messages
    }

    fn parse_response(res: &LenientResponse) -> Result<ChatResponse, LlmError> {
        let choice = res
            .choices
            .first()
            .ok_or_else(|| LlmError::ApiError("Empty response".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .iter()
            .flatten()
            .map(|c| ToolCall {
                id: c.id.clone(),
                function: ToolCallFunction {
                    name: c.function.name.clone(),
                    arguments: c.function.arguments.clone(),
                },
            })
            .collect();

        Ok(ChatResponse {
            content: choice.message.content.clone(),
            tool_calls,
            finish_reason: choice
                .finish_reason
                .clone()
                .unwrap_or_else(|| "stop".to_string()),
        })
    }

    /// Chat completion with tool calling support
    ///
    /// # Errors
    ///
    /// Returns `LlmError::NetworkError` on connectivity issues,
    /// `LlmError::ApiError` on non-success status codes, or
    /// `LlmError::JsonError` if parsing the response fails.
    pub async fn chat_with_tools(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &[ToolDefinition],
        model_id: &str,
    ) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let messages = Self::prepare_messages(system_prompt, history);

        let openai_tools: Vec<serde_json::Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters
                    }
                })
            })
            .collect();

        let body = json!({
            "model": model_id,
            "messages": messages,
            "tools": openai_tools,
            "temperature": AGENT_TEMPERATURE
        });

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError(format!(
                "Gemini API error: {status} - {error_text}"
            )));
        }

        let res_json: LenientResponse = response
            .json()
            .await
            .map_err(|e| LlmError::JsonError(e.to_string()))?;

        Self::parse_response(&res_json)
    }
}
