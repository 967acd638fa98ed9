//! Chat model abstraction.
//!
//! Messages, tool calls and streamed deltas are modelled here independently of
//! any provider so the orchestration loop can run against a stub model in tests.

pub mod accumulator;
mod openai;

pub use accumulator::{AccumulatedResponse, ResponseAccumulator};
pub use openai::OpenAIChatModel;

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id, echoed back in the tool result.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// JSON-encoded arguments.
    pub arguments: String,
}

/// An image reference inside multimodal user content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One part of multimodal user content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// User message content: plain text or a list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Prepend text to the content. For multimodal content the first text part
    /// is extended, or a new leading text part is inserted.
    pub fn prepend_text(&mut self, prefix: &str) {
        match self {
            MessageContent::Text(text) => text.insert_str(0, prefix),
            MessageContent::Parts(parts) => match parts.first_mut() {
                Some(ContentPart::Text { text }) => text.insert_str(0, prefix),
                _ => parts.insert(
                    0,
                    ContentPart::Text {
                        text: prefix.to_string(),
                    },
                ),
            },
        }
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

/// A role-tagged message in the turn context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: MessageContent,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage::User {
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Build a message from a client-supplied role and JSON content.
    ///
    /// `human` is treated as `user`; unknown roles fall back to `user`.
    pub fn from_wire(role: &str, content: Value) -> Self {
        let content = match content {
            Value::String(text) => MessageContent::Text(text),
            Value::Array(items) => {
                let raw = Value::Array(items);
                match serde_json::from_value::<Vec<ContentPart>>(raw.clone()) {
                    Ok(parts) => MessageContent::Parts(parts),
                    Err(_) => MessageContent::Text(raw.to_string()),
                }
            }
            Value::Null => MessageContent::Text(String::new()),
            other => MessageContent::Text(other.to_string()),
        };

        match role.to_lowercase().as_str() {
            "system" => ChatMessage::System {
                content: content.text(),
            },
            "user" | "human" => ChatMessage::User { content },
            "assistant" | "ai" => ChatMessage::assistant(content.text()),
            other => {
                warn!("Unknown role '{}', treating as user message", other);
                ChatMessage::User { content }
            }
        }
    }
}

/// A client-supplied chat message prior to normalisation.
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Value,
}

impl From<WireMessage> for ChatMessage {
    fn from(message: WireMessage) -> Self {
        ChatMessage::from_wire(&message.role, message.content)
    }
}

/// A tool definition offered to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

/// A fragment of a tool call as streamed by the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallDelta {
    /// Position of the call within the response.
    pub index: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    /// Fragment of the JSON arguments, appended in order.
    pub arguments: Option<String>,
}

/// One streamed chunk of a model response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelDelta {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallDelta>,
}

impl ModelDelta {
    /// A text-only delta.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }
}

/// Stream of model deltas.
pub type DeltaStream = BoxStream<'static, Result<ModelDelta>>;

/// Trait for chat models with tool calling.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Start a streaming completion over the messages with the given tools bound.
    async fn stream(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<DeltaStream>;

    /// Run a completion to the end and return the merged response.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<AccumulatedResponse> {
        let stream = self.stream(messages, tools).await?;
        ResponseAccumulator::accumulate_stream(stream).await
    }

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}
