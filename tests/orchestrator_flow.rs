//! End-to-end chat turns against a scripted model and the real calculator and
//! date tools.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use vidya::config::{Prompts, Settings};
use vidya::context::TurnContext;
use vidya::llm::{ChatMessage, ChatModel, DeltaStream, ModelDelta, ToolCallDelta, ToolSpec};
use vidya::orchestrator::{Orchestrator, StreamEvent};
use vidya::tools::{CalculatorTool, DateTool, Source, Tool, ToolOutput, ToolRegistry};
use vidya::{Result, VidyaError};

struct Script {
    responses: Mutex<VecDeque<Vec<ModelDelta>>>,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl Script {
    fn new(responses: Vec<Vec<ModelDelta>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatModel for Script {
    async fn stream(&self, messages: &[ChatMessage], _tools: &[ToolSpec]) -> Result<DeltaStream> {
        self.seen.lock().unwrap().push(messages.to_vec());
        let deltas = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| VidyaError::Model("no more responses".to_string()))?;
        Ok(futures::stream::iter(deltas.into_iter().map(Ok)).boxed())
    }

    fn model_name(&self) -> &str {
        "script"
    }
}

/// Returns the same two passages for any query.
struct Library;

#[async_trait]
impl Tool for Library {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "search_knowledge_base".to_string(),
            description: "Search study materials".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"]
            }),
        }
    }

    fn usage_notice(&self) -> String {
        "Searching study materials".to_string()
    }

    async fn call(&self, _arguments: &Value, _ctx: &TurnContext) -> Result<ToolOutput> {
        let sources = vec![
            Source {
                document_name: "Workbook.pdf".to_string(),
                page_number: 12,
                excerpt: "Expense ratio is charged annually.".to_string(),
            },
            Source {
                document_name: "Workbook.pdf".to_string(),
                page_number: 13,
                excerpt: "Exit load applies on early redemption.".to_string(),
            },
        ];
        Ok(ToolOutput {
            content: "[]".to_string(),
            sources,
        })
    }
}

fn call(index: usize, id: &str, name: &str, args: &str) -> ToolCallDelta {
    ToolCallDelta {
        index,
        id: Some(id.to_string()),
        name: Some(name.to_string()),
        arguments: Some(args.to_string()),
    }
}

fn registry() -> ToolRegistry {
    ToolRegistry::new()
        .with(Arc::new(Library))
        .with(Arc::new(CalculatorTool))
        .with(Arc::new(DateTool))
}

fn ctx() -> TurnContext {
    TurnContext::resolve(&Settings::default(), None, Some("hi-IN")).unwrap()
}

#[tokio::test]
async fn answers_with_tool_results_and_sources() {
    let model = Script::new(vec![
        vec![
            ModelDelta {
                content: None,
                tool_calls: vec![call(0, "c1", "calculator", "")],
            },
            ModelDelta {
                content: None,
                tool_calls: vec![ToolCallDelta {
                    index: 0,
                    arguments: Some(r#"{"expression": "1000 * 3 / 200"}"#.to_string()),
                    ..Default::default()
                }],
            },
            ModelDelta {
                content: None,
                tool_calls: vec![call(1, "k1", "search_knowledge_base", r#"{"query": "expense ratio"}"#)],
            },
        ],
        vec![ModelDelta::text("The annual cost is "), ModelDelta::text("15.")],
    ]);

    let orchestrator = Arc::new(Orchestrator::new(model.clone(), registry(), Prompts::default()));
    let events: Vec<StreamEvent> = orchestrator
        .stream(vec![ChatMessage::user("What is 1.5% of 1000?")], ctx())
        .collect()
        .await;

    assert_eq!(
        events,
        vec![
            StreamEvent::ToolUsage("Using the Calculator".to_string()),
            StreamEvent::ToolUsage("Searching study materials".to_string()),
            StreamEvent::FinalContent("The annual cost is ".to_string()),
            StreamEvent::FinalContent("15.".to_string()),
            StreamEvent::Source(vec![
                Source {
                    document_name: "Workbook.pdf".to_string(),
                    page_number: 12,
                    excerpt: "Expense ratio is charged annually.".to_string(),
                },
                Source {
                    document_name: "Workbook.pdf".to_string(),
                    page_number: 13,
                    excerpt: "Exit load applies on early redemption.".to_string(),
                },
            ]),
            StreamEvent::Done,
        ]
    );

    let seen = model.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    let results: Vec<&ChatMessage> = seen[1]
        .iter()
        .filter(|m| matches!(m, ChatMessage::Tool { .. }))
        .collect();
    assert_eq!(results.len(), 2);
    match results[0] {
        ChatMessage::Tool {
            tool_call_id,
            name,
            content,
        } => {
            assert_eq!(tool_call_id, "c1");
            assert_eq!(name, "calculator");
            assert_eq!(content, "15");
        }
        other => panic!("Expected tool result, got {:?}", other),
    }
}

#[tokio::test]
async fn tool_input_errors_flow_back_to_the_model() {
    let model = Script::new(vec![
        vec![ModelDelta {
            content: None,
            tool_calls: vec![call(0, "d1", "date_calculator", r#"{"operation": "fortnight"}"#)],
        }],
        vec![ModelDelta::text("Sorry, I could not check the calendar.")],
    ]);

    let orchestrator = Orchestrator::new(model.clone(), registry(), Prompts::default());
    let events = orchestrator
        .collect(vec![ChatMessage::user("When is the exam?")], &ctx())
        .await;

    assert_eq!(events.first(), Some(&StreamEvent::ToolUsage("Checking the calendar".to_string())));
    assert!(!events.iter().any(|e| matches!(e, StreamEvent::Error(_))));

    let seen = model.seen.lock().unwrap();
    let reply = seen[1].iter().find_map(|m| match m {
        ChatMessage::Tool { content, .. } => Some(content.clone()),
        _ => None,
    });
    assert!(reply.unwrap().starts_with("Error: Unsupported operation 'fortnight'"));
}

#[tokio::test]
async fn sse_output_ends_with_done_marker() {
    let model = Script::new(vec![vec![ModelDelta::text("Namaste")]]);
    let orchestrator = Orchestrator::new(model, registry(), Prompts::default());

    let body: String = orchestrator
        .collect(vec![ChatMessage::user("hi")], &ctx())
        .await
        .iter()
        .map(StreamEvent::to_sse)
        .collect();

    assert_eq!(
        body,
        "data: {\"type\":\"content\",\"content\":\"Namaste\"}\n\ndata: [DONE]\n\n"
    );
}

#[tokio::test]
async fn model_failure_is_a_single_error() {
    let model = Script::new(Vec::new());
    let orchestrator = Orchestrator::new(model, registry(), Prompts::default());

    let events = orchestrator
        .collect(vec![ChatMessage::user("hi")], &ctx())
        .await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Error("Error in chat processing: Model error: no more responses".to_string()),
            StreamEvent::Done,
        ]
    );
}
