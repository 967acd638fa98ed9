//! Tool-augmented chat orchestration.
//!
//! A turn runs as follows:
//!
//! 1. A system message carrying persona and target language is prepended.
//! 2. The model is called with the registry's tool definitions and its
//!    streamed deltas are accumulated.
//! 3. Without tool calls, the accumulated text fragments are emitted as
//!    [`StreamEvent::Content`] and the turn ends.
//! 4. Otherwise each requested tool runs in order, announced by a
//!    [`StreamEvent::ToolUsage`] notice, and its result is appended to the
//!    context. A failing tool yields one [`StreamEvent::Error`] and an error
//!    result message; the remaining calls still run.
//! 5. Once the round budget is spent the model is called again and its text
//!    streams live as [`StreamEvent::FinalContent`].
//! 6. Gathered sources are emitted once, then [`StreamEvent::Done`].

mod events;

pub use events::{StreamEvent, DONE_MARKER};

use crate::config::{Prompts, Settings};
use crate::context::TurnContext;
use crate::embedding::OpenAIEmbedder;
use crate::error::Result;
use crate::llm::{
    AccumulatedResponse, ChatMessage, ChatModel, ModelDelta, OpenAIChatModel, ResponseAccumulator, ToolSpec,
};
use crate::tools::{Source, ToolRegistry};
use crate::vector_store;
use futures::channel::mpsc::{self, UnboundedSender};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Sending half of a turn's event stream.
pub type EventSink = UnboundedSender<StreamEvent>;

/// Drives chat turns against a model and a fixed tool registry.
pub struct Orchestrator {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    prompts: Prompts,
    max_tool_rounds: usize,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn ChatModel>, tools: ToolRegistry, prompts: Prompts) -> Self {
        Self {
            model,
            tools,
            prompts,
            max_tool_rounds: 1,
        }
    }

    /// Set how many tool rounds a turn may execute.
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Build the production orchestrator: OpenAI model, configured vector
    /// store, and the configured subset of the standard tools.
    pub fn from_settings(settings: &Settings, prompts: Prompts) -> Result<Self> {
        let model: Arc<dyn ChatModel> = Arc::new(OpenAIChatModel::from_settings(&settings.llm)?);
        let embedder = Arc::new(OpenAIEmbedder::from_settings(&settings.llm, &settings.embedding)?);
        let store = vector_store::open(settings)?;

        let tools = ToolRegistry::standard(settings, &prompts, model.clone(), embedder, store)?
            .subset(&settings.orchestrator.tools)?;

        info!(
            "Orchestrator ready with model {} and tools [{}]",
            model.model_name(),
            tools.names().join(", ")
        );

        Ok(Self::new(model, tools, prompts).with_max_tool_rounds(settings.orchestrator.max_tool_rounds))
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn model(&self) -> Arc<dyn ChatModel> {
        self.model.clone()
    }

    /// The persona directive for a turn.
    pub fn system_message(&self, ctx: &TurnContext) -> ChatMessage {
        let vars = HashMap::from([
            ("exam_name".to_string(), ctx.exam_name.clone()),
            ("language".to_string(), ctx.language.clone()),
        ]);
        ChatMessage::system(
            self.prompts
                .render_with_custom(&self.prompts.orchestrator.system, &vars),
        )
    }

    /// Spawn a turn and return its event stream. The stream ends after
    /// [`StreamEvent::Done`].
    pub fn stream(self: &Arc<Self>, messages: Vec<ChatMessage>, ctx: TurnContext) -> BoxStream<'static, StreamEvent> {
        let (tx, rx) = mpsc::unbounded();
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator.run_turn(messages, &ctx, &tx).await;
        });
        rx.boxed()
    }

    /// Run a turn to completion and collect its events.
    pub async fn collect(&self, messages: Vec<ChatMessage>, ctx: &TurnContext) -> Vec<StreamEvent> {
        let (tx, rx) = mpsc::unbounded();
        self.run_turn(messages, ctx, &tx).await;
        drop(tx);
        rx.collect().await
    }

    /// Run one turn, sending every event to `sink`. Always ends with
    /// [`StreamEvent::Done`]; sends to a closed sink are ignored.
    #[instrument(skip(self, messages, ctx, sink), fields(exam = %ctx.exam_id, language = %ctx.language))]
    pub async fn run_turn(&self, messages: Vec<ChatMessage>, ctx: &TurnContext, sink: &EventSink) {
        match self.drive(messages, ctx, sink).await {
            Ok(sources) => {
                if !sources.is_empty() {
                    emit(sink, StreamEvent::Source(sources));
                }
            }
            Err(e) => {
                warn!("Chat turn failed: {}", e);
                emit(sink, StreamEvent::Error(format!("Error in chat processing: {}", e)));
            }
        }
        emit(sink, StreamEvent::Done);
    }

    async fn drive(&self, messages: Vec<ChatMessage>, ctx: &TurnContext, sink: &EventSink) -> Result<Vec<Source>> {
        let mut context = Vec::with_capacity(messages.len() + 1);
        context.push(self.system_message(ctx));
        context.extend(messages);

        let specs = self.tools.specs();
        let mut sources = Vec::new();

        if disconnected(sink) {
            return Ok(sources);
        }
        let mut response = self.model.complete(&context, &specs).await?;
        if !response.has_tool_calls() {
            emit_fragments(sink, response, StreamEvent::Content);
            return Ok(sources);
        }
        if self.max_tool_rounds == 0 {
            warn!(
                "Ignoring {} tool calls: tool rounds are disabled",
                response.tool_calls.len()
            );
            emit_fragments(sink, response, StreamEvent::Content);
            return Ok(sources);
        }

        let mut round = 0;
        loop {
            round += 1;
            debug!("Tool round {} with {} calls", round, response.tool_calls.len());
            self.execute_round(response, &mut context, &mut sources, ctx, sink)
                .await;
            if disconnected(sink) {
                return Ok(sources);
            }

            if round >= self.max_tool_rounds {
                self.stream_final(&context, &specs, sink).await?;
                return Ok(sources);
            }

            response = self.model.complete(&context, &specs).await?;
            if !response.has_tool_calls() {
                emit_fragments(sink, response, StreamEvent::FinalContent);
                return Ok(sources);
            }
        }
    }

    /// Execute every tool call of one response, appending the assistant message
    /// and one result message per call.
    async fn execute_round(
        &self,
        response: AccumulatedResponse,
        context: &mut Vec<ChatMessage>,
        sources: &mut Vec<Source>,
        ctx: &TurnContext,
        sink: &EventSink,
    ) {
        let calls = response.tool_calls.clone();
        context.push(ChatMessage::Assistant {
            content: response.text(),
            tool_calls: response.tool_calls,
        });

        for call in calls {
            if sink.is_closed() {
                return;
            }
            if let Some(tool) = self.tools.get(&call.name) {
                emit(sink, StreamEvent::ToolUsage(tool.usage_notice()));
            }

            let content = match self.tools.execute(&call, ctx).await {
                Ok(output) => {
                    for source in output.sources {
                        if !sources.contains(&source) {
                            sources.push(source);
                        }
                    }
                    output.content
                }
                Err(e) => {
                    let message = format!("Error executing tool {}: {}", call.name, e);
                    warn!("{}", message);
                    emit(sink, StreamEvent::Error(message.clone()));
                    message
                }
            };

            context.push(ChatMessage::Tool {
                tool_call_id: call.id,
                name: call.name,
                content,
            });
        }
    }

    /// Stream the closing response live. Tool calls it requests are not run.
    async fn stream_final(&self, context: &[ChatMessage], specs: &[ToolSpec], sink: &EventSink) -> Result<()> {
        let mut stream = self.model.stream(context, specs).await?;
        let mut accumulator = ResponseAccumulator::new();

        while let Some(delta) = stream.next().await {
            if disconnected(sink) {
                return Ok(());
            }
            let delta = delta?;
            if let Some(text) = delta.content.as_deref().filter(|t| !t.is_empty()) {
                emit(sink, StreamEvent::FinalContent(text.to_string()));
            }
            accumulator.push(ModelDelta {
                content: None,
                tool_calls: delta.tool_calls,
            });
        }

        let ignored = accumulator.finish().tool_calls;
        if !ignored.is_empty() {
            warn!(
                "Tool round limit reached; ignoring {} further tool calls: {}",
                ignored.len(),
                ignored.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
            );
        }
        Ok(())
    }
}

fn emit(sink: &EventSink, event: StreamEvent) {
    if sink.unbounded_send(event).is_err() {
        debug!("Event receiver dropped");
    }
}

/// True once the client has gone; the turn stops before any further model or tool call.
fn disconnected(sink: &EventSink) -> bool {
    if sink.is_closed() {
        info!("Client disconnected, stopping turn");
        true
    } else {
        false
    }
}

fn emit_fragments(sink: &EventSink, response: AccumulatedResponse, kind: fn(String) -> StreamEvent) {
    for fragment in response.fragments {
        emit(sink, kind(fragment));
    }
}
