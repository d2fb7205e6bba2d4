//! Agent dispatcher
//!
//! Routes non-command messages to Gemini with the registered tool set and a
//! bounded tool-calling loop. Stateless: each message is a fresh, single
//! invocation with no conversation memory.

use crate::config::{AGENT_MAX_ITERATIONS, GEMINI_MODEL};
use crate::llm::gemini::GeminiProvider;
use crate::llm::{LlmError, Message};
use crate::tools::ToolRegistry;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Fixed fallback when no Gemini credential is configured
pub const AI_UNAVAILABLE: &str =
    "Lo siento, la IA no está activa. Revisa la configuración de GEMINI_API_KEY.";

/// Fixed generic failure message shown when an invocation fails
pub const AI_FAILURE: &str =
    "Lo siento, hubo un error interno al procesar tu solicitud con la IA. Intenta de nuevo.";

const EMPTY_ANSWER: &str = "La tarea terminó, pero la respuesta está vacía.";

const SYSTEM_PROMPT: &str = "Eres un asistente inteligente de Telegram. Respondes en español, \
de forma breve y clara. Cuando una pregunta trate del clima actual o requiera un cálculo \
aritmético, usa la herramienta correspondiente en lugar de estimar la respuesta.";

/// Dispatches free-form messages to the LLM agent
pub struct AgentDispatcher {
    provider: Option<GeminiProvider>,
    registry: Arc<ToolRegistry>,
}

impl AgentDispatcher {
    /// Build the dispatcher from settings; a missing Gemini key degrades to
    /// the fixed "AI unavailable" reply instead of failing.
    #[must_use]
    pub fn new(settings: &crate::config::Settings, registry: Arc<ToolRegistry>) -> Self {
        let provider = settings
            .gemini_api_key
            .as_ref()
            .map(|key| GeminiProvider::new(key.clone()));
        if provider.is_none() {
            info!("GEMINI_API_KEY not set; agent replies with the unavailable notice");
        }
        Self { provider, registry }
    }

    /// Build the dispatcher around an explicit provider (used by tests)
    #[must_use]
    pub fn with_provider(provider: Option<GeminiProvider>, registry: Arc<ToolRegistry>) -> Self {
        Self { provider, registry }
    }

    /// Whether an LLM backend is configured
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    /// Process one user message and return displayable text.
    ///
    /// Never fails: configuration gaps and invocation errors are converted
    /// into their fixed user-facing messages, with the detail logged
    /// server-side only.
    pub async fn dispatch(&self, text: &str) -> String {
        let Some(provider) = &self.provider else {
            return AI_UNAVAILABLE.to_string();
        };

        match self.run(provider, text).await {
            Ok(answer) => answer,
            Err(e) => {
                error!(error = %e, "Agent invocation failed");
                AI_FAILURE.to_string()
            }
        }
    }

    /// The agentic loop: call the model, execute requested tools, feed the
    /// results back, until a final answer or the iteration cap.
    async fn run(&self, provider: &GeminiProvider, text: &str) -> Result<String, LlmError> {
        let tools = self.registry.all_tools();
        let mut messages = vec![Message::user(text)];

        for iteration in 0..AGENT_MAX_ITERATIONS {
            debug!(
                iteration,
                messages_count = messages.len(),
                "Agent loop iteration"
            );

            let response = provider
                .chat_with_tools(SYSTEM_PROMPT, &messages, &tools, GEMINI_MODEL)
                .await?;

            if response.tool_calls.is_empty() {
                let answer = response
                    .content
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| EMPTY_ANSWER.to_string());
                return Ok(answer);
            }

            messages.push(Message::assistant_with_tools(
                response.content.as_deref().unwrap_or_default(),
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                debug!(tool = %call.function.name, "Agent requested tool");
                let result = match self
                    .registry
                    .execute(&call.function.name, &call.function.arguments)
                    .await
                {
                    Ok(output) => output,
                    // Unknown tool names are fed back as text so the model
                    // can correct itself within the iteration budget.
                    Err(e) => format!("Error: {e}"),
                };
                messages.push(Message::tool(&call.id, &result));
            }
        }

        Err(LlmError::IterationLimit(AGENT_MAX_ITERATIONS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::calculator::CalculatorProvider;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(CalculatorProvider));
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_dispatch_without_key_returns_fixed_message() {
        let dispatcher = AgentDispatcher::with_provider(None, registry());
        assert!(!dispatcher.is_available());
        assert_eq!(dispatcher.dispatch("hola").await, AI_UNAVAILABLE);
        assert_eq!(dispatcher.dispatch("¿cuánto es 2+2?").await, AI_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_dispatch_tool_round_trip() {
        let server = MockServer::start().await;

        // First turn: the model asks for the calculator.
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {
                                "name": "calculadora",
                                "arguments": "{\"expresion\": \"2 + 2\"}"
                            }
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        // Second turn: final answer.
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": { "content": "El resultado es 4." },
                    "finish_reason": "stop"
                }]
            })))
            .mount(&server)
            .await;

        let provider = GeminiProvider::with_base_url("k".to_string(), server.uri());
        let dispatcher = AgentDispatcher::with_provider(Some(provider), registry());

        let answer = dispatcher.dispatch("¿cuánto es 2+2?").await;
        assert_eq!(answer, "El resultado es 4.");
    }

    #[tokio::test]
    async fn test_dispatch_backend_error_returns_generic_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let provider = GeminiProvider::with_base_url("k".to_string(), server.uri());
        let dispatcher = AgentDispatcher::with_provider(Some(provider), registry());

        assert_eq!(dispatcher.dispatch("hola").await, AI_FAILURE);
    }

    #[tokio::test]
    async fn test_dispatch_iteration_cap_is_enforced() {
        let server = MockServer::start().await;
        // The model keeps asking for tools forever; the loop must stop.
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "content": null,
                        "tool_calls": [{
                            "id": "call_n",
                            "type": "function",
                            "function": {
                                "name": "calculadora",
                                "arguments": "{\"expresion\": \"1 + 1\"}"
                            }
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            })))
            .mount(&server)
            .await;

        let provider = GeminiProvider::with_base_url("k".to_string(), server.uri());
        let dispatcher = AgentDispatcher::with_provider(Some(provider), registry());

        assert_eq!(dispatcher.dispatch("bucle").await, AI_FAILURE);
        // Exactly AGENT_MAX_ITERATIONS requests were made before giving up.
        let received = server.received_requests().await.unwrap_or_default();
        assert_eq!(received.len(), AGENT_MAX_ITERATIONS);
    }
}
