//! Tool adapters exposed to the model.
//!
//! Each adapter wraps one external capability behind the [`Tool`] trait and is
//! looked up by name through a [`ToolRegistry`].

mod calculator;
mod date;
mod knowledge_base;
mod tutor;
mod web_search;

pub use calculator::{evaluate, CalculatorTool};
pub use date::{date_operation, DateTool};
pub use knowledge_base::KnowledgeBaseTool;
pub use tutor::TutorTool;
pub use web_search::{clean_text, WebSearchTool};

use crate::agent::AgentRunner;
use crate::config::{Prompts, Settings};
use crate::context::TurnContext;
use crate::embedding::Embedder;
use crate::error::{Result, VidyaError};
use crate::llm::{ChatModel, ToolCall, ToolSpec};
use crate::vector_store::VectorStore;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// A citation for retrieved study material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub document_name: String,
    pub page_number: u32,
    pub excerpt: String,
}

/// Result of a tool call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    /// Text handed back to the model.
    pub content: String,
    /// Citations produced by this call.
    pub sources: Vec<Source>,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sources: Vec::new(),
        }
    }
}

/// A capability the model can call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and argument schema offered to the model.
    fn spec(&self) -> ToolSpec;

    /// Short notice shown to the user while the tool runs.
    fn usage_notice(&self) -> String;

    /// Execute the tool with parsed JSON arguments.
    async fn call(&self, arguments: &Value, ctx: &TurnContext) -> Result<ToolOutput>;
}

/// Deserialize tool arguments into a typed struct.
pub(crate) fn parse_args<T: DeserializeOwned>(tool: &str, arguments: &Value) -> Result<T> {
    serde_json::from_value(arguments.clone())
        .map_err(|e| VidyaError::InvalidInput(format!("Invalid arguments for {}: {}", tool, e)))
}

/// Ordered name → adapter table.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.spec().name;
        self.tools.retain(|t| t.spec().name != name);
        self.tools.push(tool);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.spec().name == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.spec().name).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// A registry holding only the named tools, in the given order.
    pub fn subset(&self, names: &[String]) -> Result<Self> {
        let tools = names
            .iter()
            .map(|name| {
                self.get(name)
                    .ok_or_else(|| VidyaError::Config(format!("Unknown tool in config: {}", name)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { tools })
    }

    /// Resolve and run a model-requested tool call.
    pub async fn execute(&self, call: &ToolCall, ctx: &TurnContext) -> Result<ToolOutput> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| VidyaError::UnknownTool(call.name.clone()))?;

        let arguments: Value = if call.arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&call.arguments).map_err(|e| {
                VidyaError::InvalidInput(format!("Invalid tool arguments: {}", e))
            })?
        };

        info!("Calling tool: {} with args: {}", call.name, call.arguments);
        tool.call(&arguments, ctx).await
    }

    /// The full tool set: web search, knowledge-base search, calculator, date
    /// utility, and the tutor agent (which itself uses the first four).
    pub fn standard(
        settings: &Settings,
        prompts: &Prompts,
        model: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        let base = ToolRegistry::new()
            .with(Arc::new(
                KnowledgeBaseTool::new(embedder, vector_store, settings.search.knowledge_base_results)
                    .with_default_collection(settings.search.default_collection.clone()),
            ))
            .with(Arc::new(CalculatorTool))
            .with(Arc::new(DateTool))
            .with(Arc::new(WebSearchTool::from_settings(&settings.search)?));

        let tutor = TutorTool::new(
            AgentRunner::new(model, base.clone())
                .with_max_iterations(settings.orchestrator.agent_max_iterations),
            prompts.agents.tutor.clone(),
            prompts.clone(),
        );

        Ok(base.with(Arc::new(tutor)))
    }
}
