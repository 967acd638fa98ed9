//! Agent runner with tool calling loop.

use super::AgentDefinition;
use crate::context::TurnContext;
use crate::error::{Result, VidyaError};
use crate::llm::{ChatMessage, ChatModel};
use crate::tools::{Source, ToolRegistry};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Runs an agent definition against a model with its own tools.
#[derive(Clone)]
pub struct AgentRunner {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    max_iterations: usize,
}

impl AgentRunner {
    /// Create a new runner with the given model and tools.
    pub fn new(model: Arc<dyn ChatModel>, tools: ToolRegistry) -> Self {
        Self {
            model,
            tools,
            max_iterations: 10,
        }
    }

    /// Set maximum iterations for the agent loop.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Run the agent on a rendered task.
    #[instrument(skip(self, definition, task, ctx), fields(role = %definition.role))]
    pub async fn run(
        &self,
        definition: &AgentDefinition,
        task: &str,
        ctx: &TurnContext,
    ) -> Result<AgentResponse> {
        let mut messages = vec![
            ChatMessage::system(definition.system_prompt()),
            ChatMessage::user(format!(
                "{}\n\nThis is the expected criteria for your final answer: {}",
                task, definition.expected_output
            )),
        ];
        let specs = self.tools.specs();

        let mut iterations = 0;
        let mut tool_calls_made = Vec::new();
        let mut sources = Vec::new();

        loop {
            iterations += 1;
            if iterations > self.max_iterations {
                return Err(VidyaError::Agent(format!(
                    "Agent exceeded maximum iterations ({})",
                    self.max_iterations
                )));
            }

            debug!("Agent iteration {}", iterations);

            let response = self.model.complete(&messages, &specs).await?;

            if !response.has_tool_calls() {
                return Ok(AgentResponse {
                    content: response.text(),
                    tool_calls: tool_calls_made,
                    sources,
                    iterations,
                });
            }

            messages.push(ChatMessage::Assistant {
                content: response.text(),
                tool_calls: response.tool_calls.clone(),
            });

            for call in &response.tool_calls {
                info!("Agent calling tool: {} with args: {}", call.name, call.arguments);

                let result = match self.tools.execute(call, ctx).await {
                    Ok(output) => {
                        sources.extend(output.sources);
                        output.content
                    }
                    Err(e) => format!("Tool error: {}", e),
                };

                messages.push(ChatMessage::Tool {
                    tool_call_id: call.id.clone(),
                    name: call.name.clone(),
                    content: result.clone(),
                });

                tool_calls_made.push(ToolCallRecord {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    result,
                });
            }
        }
    }
}

/// Response from an agent run.
#[derive(Debug)]
pub struct AgentResponse {
    /// The final response content from the agent.
    pub content: String,
    /// Record of all tool calls made during execution.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Citations gathered by the agent's tools.
    pub sources: Vec<Source>,
    /// Number of iterations (LLM calls) used.
    pub iterations: usize,
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Result returned by the tool.
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::llm::testing::{tool_call, ScriptedModel};
    use crate::llm::ModelDelta;
    use crate::tools::testing::EchoTool;
    use crate::tools::ToolOutput;

    fn ctx() -> TurnContext {
        TurnContext::resolve(&Settings::default(), None, None).unwrap()
    }

    fn kb_tool(fail: bool) -> ToolRegistry {
        ToolRegistry::new().with(Arc::new(EchoTool {
            name: "search_knowledge_base",
            notice: "Searching study materials",
            reply: ToolOutput {
                content: "[{\"page_content\":\"KYC\"}]".to_string(),
                sources: vec![Source {
                    document_name: "IA.pdf".to_string(),
                    page_number: 7,
                    excerpt: "KYC".to_string(),
                }],
            },
            fail,
        }))
    }

    #[test]
    fn test_tool_call_record_display() {
        let record = ToolCallRecord {
            name: "calculator".to_string(),
            arguments: r#"{"expression": "2 + 2"}"#.to_string(),
            result: "4".to_string(),
        };
        assert_eq!(format!("{}", record), r#"calculator({"expression": "2 + 2"})"#);
    }

    #[tokio::test]
    async fn test_runs_tools_then_answers() {
        let model = Arc::new(ScriptedModel::new(vec![
            vec![tool_call(0, "call_1", "search_knowledge_base", r#"{"query":"KYC"}"#)],
            vec![ModelDelta::text("KYC is "), ModelDelta::text("mandatory.")],
        ]));
        let runner = AgentRunner::new(model.clone(), kb_tool(false));

        let response = runner
            .run(&AgentDefinition::default(), "Explain KYC", &ctx())
            .await
            .unwrap();

        assert_eq!(response.content, "KYC is mandatory.");
        assert_eq!(response.iterations, 2);
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.sources.len(), 1);

        let second = model.messages(1);
        assert!(matches!(
            &second[3],
            ChatMessage::Tool { tool_call_id, .. } if tool_call_id == "call_1"
        ));
    }

    #[tokio::test]
    async fn test_tool_failure_is_fed_back() {
        let model = Arc::new(ScriptedModel::new(vec![
            vec![tool_call(0, "call_1", "search_knowledge_base", "{}")],
            vec![ModelDelta::text("Not found in the materials.")],
        ]));
        let runner = AgentRunner::new(model, kb_tool(true));

        let response = runner
            .run(&AgentDefinition::default(), "Explain KYC", &ctx())
            .await
            .unwrap();
        assert!(response.tool_calls[0].result.starts_with("Tool error:"));
        assert!(response.sources.is_empty());
    }

    #[tokio::test]
    async fn test_iteration_cap() {
        let model = Arc::new(ScriptedModel::new(vec![
            vec![tool_call(0, "a", "search_knowledge_base", "{}")],
            vec![tool_call(0, "b", "search_knowledge_base", "{}")],
        ]));
        let runner = AgentRunner::new(model, kb_tool(false)).with_max_iterations(2);

        let err = runner
            .run(&AgentDefinition::default(), "loop", &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, VidyaError::Agent(_)));
    }
}
