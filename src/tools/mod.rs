//! Tool providers and registry
//!
//! The registry is built once at startup and shared read-only across all
//! message cycles; each provider owns one or more named tools.

/// Restricted arithmetic evaluator tool
pub mod calculator;
/// Weather lookup tool
pub mod weather;

use crate::llm::ToolDefinition;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Unified interface for tool providers
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;

    /// Returns the list of tools this provider offers
    fn tools(&self) -> Vec<ToolDefinition>;

    /// Check if this provider can handle the given tool
    fn can_handle(&self, tool_name: &str) -> bool;

    /// Execute a tool and return the result
    ///
    /// Implementations convert their internal failures into displayable
    /// text; `Err` is reserved for tools the provider does not own.
    async fn execute(&self, tool_name: &str, arguments: &str) -> Result<String>;
}

/// Registry that manages multiple tool providers
pub struct ToolRegistry {
    providers: Vec<Box<dyn ToolProvider>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    #[must_use]
    pub const fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Register a new tool provider
    ///
    /// Tool names must stay unique within the registry; a clashing
    /// registration is rejected with a warning.
    pub fn register(&mut self, provider: Box<dyn ToolProvider>) {
        let existing = self.all_tools();
        if provider
            .tools()
            .iter()
            .any(|t| existing.iter().any(|e| e.name == t.name))
        {
            warn!(
                provider = provider.name(),
                "Provider offers an already registered tool name, skipping"
            );
            return;
        }
        info!(provider = provider.name(), "Registered tool provider");
        self.providers.push(provider);
    }

    /// Get all tools from all registered providers
    #[must_use]
    pub fn all_tools(&self) -> Vec<ToolDefinition> {
        self.providers.iter().flat_map(|p| p.tools()).collect()
    }

    /// Find a provider and execute the tool
    ///
    /// # Errors
    ///
    /// Returns an error if no provider can handle the tool.
    pub async fn execute(&self, tool_name: &str, arguments: &str) -> Result<String> {
        debug!(tool = tool_name, "Looking for provider to handle tool");

        for provider in &self.providers {
            if provider.can_handle(tool_name) {
                return provider.execute(tool_name, arguments).await;
            }
        }

        warn!(tool = tool_name, "No provider found for tool");
        Err(anyhow!("Herramienta desconocida: {tool_name}"))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
