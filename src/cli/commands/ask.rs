//! Ask command implementation.

use crate::agent::{AgentDefinitions, AgentRunner};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{Prompts, Settings};
use crate::context::TurnContext;
use crate::embedding::OpenAIEmbedder;
use crate::llm::{ChatMessage, ChatModel, OpenAIChatModel};
use crate::orchestrator::{Orchestrator, StreamEvent};
use crate::tools::ToolRegistry;
use crate::vector_store;
use anyhow::Result;
use futures::StreamExt;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

/// Tools available to a standalone agent run.
const AGENT_TOOLS: [&str; 4] = [
    "search_knowledge_base",
    "calculator",
    "date_calculator",
    "get_web_search_result",
];

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    exam: Option<String>,
    language: &str,
    agent: Option<String>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Chat) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }
    for warning in preflight::warnings(Operation::Chat) {
        Output::warning(&warning);
    }

    let ctx = TurnContext::resolve(&settings, exam.as_deref(), Some(language))?;
    let prompts = Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )?;

    match agent {
        Some(name) => run_agent(question, &name, &ctx, prompts, &settings).await,
        None => run_chat_turn(question, ctx, prompts, &settings).await,
    }
}

/// Stream one orchestrated chat turn to the terminal.
async fn run_chat_turn(question: &str, ctx: TurnContext, prompts: Prompts, settings: &Settings) -> Result<()> {
    let orchestrator = Arc::new(Orchestrator::from_settings(settings, prompts)?);
    let mut events = orchestrator.stream(vec![ChatMessage::user(question)], ctx);

    let mut failed = false;
    let mut stdout = std::io::stdout();
    println!();

    while let Some(event) = events.next().await {
        match event {
            StreamEvent::ToolUsage(notice) => Output::tool_usage(&notice),
            StreamEvent::Content(text) | StreamEvent::FinalContent(text) => {
                print!("{}", text);
                stdout.flush()?;
            }
            StreamEvent::Error(message) => {
                failed = true;
                Output::error(&message);
            }
            StreamEvent::Source(sources) => {
                println!();
                Output::header("Sources");
                for source in &sources {
                    Output::source(source);
                }
            }
            StreamEvent::Done => println!(),
        }
    }

    if failed {
        anyhow::bail!("The answer may be incomplete: one or more steps failed");
    }
    Ok(())
}

/// Run a single agent definition with the standard tools.
async fn run_agent(
    question: &str,
    name: &str,
    ctx: &TurnContext,
    prompts: Prompts,
    settings: &Settings,
) -> Result<()> {
    let definition = prompts.agents.get(name).map_err(|e| {
        Output::error(&e.to_string());
        Output::info(&format!("Available agents: {}", AgentDefinitions::NAMES.join(", ")));
        e
    })?;

    let model: Arc<dyn ChatModel> = Arc::new(OpenAIChatModel::from_settings(&settings.llm)?);
    let embedder = Arc::new(OpenAIEmbedder::from_settings(&settings.llm, &settings.embedding)?);
    let store = vector_store::open(settings)?;
    let tools = ToolRegistry::standard(settings, &prompts, model.clone(), embedder, store)?
        .subset(&AGENT_TOOLS.map(String::from))?;

    let runner = AgentRunner::new(model, tools).with_max_iterations(settings.orchestrator.agent_max_iterations);

    let vars = HashMap::from([
        ("exam_name".to_string(), ctx.exam_name.clone()),
        ("exam_overview".to_string(), ctx.exam_overview().await),
        ("user_query".to_string(), question.to_string()),
        ("user_language".to_string(), ctx.language.clone()),
    ]);
    let task = prompts.render_with_custom(&definition.task, &vars);

    let spinner = Output::spinner(&format!("Running {} agent...", name));
    let response = runner.run(definition, &task, ctx).await;
    spinner.finish_and_clear();

    match response {
        Ok(response) => {
            println!("\n{}\n", response.content);

            if !response.tool_calls.is_empty() {
                Output::header("Tools used");
                for call in &response.tool_calls {
                    Output::list_item(&call.to_string());
                }
            }
            if !response.sources.is_empty() {
                Output::header("Sources");
                for source in &response.sources {
                    Output::source(source);
                }
            }
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Agent failed: {}", e));
            Err(e.into())
        }
    }
}
