//! Delegation to the tutor agent.

use super::{parse_args, Tool, ToolOutput};
use crate::agent::{AgentDefinition, AgentRunner};
use crate::config::Prompts;
use crate::context::TurnContext;
use crate::error::Result;
use crate::llm::ToolSpec;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{info, instrument};

/// Runs the tutor agent for the turn's exam and language.
pub struct TutorTool {
    runner: AgentRunner,
    definition: AgentDefinition,
    prompts: Prompts,
}

#[derive(Deserialize)]
struct TutorArgs {
    user_query: String,
}

impl TutorTool {
    pub fn new(runner: AgentRunner, definition: AgentDefinition, prompts: Prompts) -> Self {
        Self {
            runner,
            definition,
            prompts,
        }
    }

    async fn render_task(&self, user_query: &str, ctx: &TurnContext) -> String {
        let vars = HashMap::from([
            ("exam_name".to_string(), ctx.exam_name.clone()),
            ("exam_overview".to_string(), ctx.exam_overview().await),
            ("user_query".to_string(), user_query.to_string()),
            ("user_language".to_string(), ctx.language.clone()),
        ]);
        self.prompts.render_with_custom(&self.definition.task, &vars)
    }
}

#[async_trait]
impl Tool for TutorTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "ai_tutor_tool".to_string(),
            description: "Use this tool when answering any question about the certification \
                exams: the exam process, the syllabus, or any topic or concept that can be part \
                of the exam. Returns the information needed to answer."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "user_query": {
                        "type": "string",
                        "description": "The user's question. Rewrite it if it refers vaguely to \
                            earlier messages; otherwise use it as is."
                    }
                },
                "required": ["user_query"]
            }),
        }
    }

    fn usage_notice(&self) -> String {
        "Calling AI Tutor Agent for information".to_string()
    }

    #[instrument(skip(self, arguments, ctx), fields(exam = %ctx.exam_id))]
    async fn call(&self, arguments: &Value, ctx: &TurnContext) -> Result<ToolOutput> {
        let args: TutorArgs = parse_args("ai_tutor_tool", arguments)?;
        let task = self.render_task(&args.user_query, ctx).await;

        let response = self.runner.run(&self.definition, &task, ctx).await?;
        info!(
            "Tutor agent finished in {} iterations with {} tool calls",
            response.iterations,
            response.tool_calls.len()
        );

        Ok(ToolOutput {
            content: response.content,
            sources: response.sources,
        })
    }
}
