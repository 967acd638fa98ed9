//! OpenAI-compatible chat model with streaming tool calls.

use super::{ChatMessage, ChatModel, ContentPart, DeltaStream, MessageContent, ModelDelta, ToolCallDelta, ToolSpec};
use crate::config::LlmSettings;
use crate::error::{Result, VidyaError};
use crate::openai::client_from_settings;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
    ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
    ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs,
    CreateChatCompletionStreamResponse, FunctionCall, FunctionObject, ImageUrl,
};
use async_openai::Client;
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, instrument};

/// Chat model backed by an OpenAI-compatible chat completions API.
pub struct OpenAIChatModel {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAIChatModel {
    /// Create a chat model from settings.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        Ok(Self {
            client: client_from_settings(settings)?,
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }

    /// Create a chat model from an existing client.
    pub fn with_client(client: Client<OpenAIConfig>, model: &str, temperature: f32) -> Self {
        Self {
            client,
            model: model.to_string(),
            temperature,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    #[instrument(skip_all, fields(model = %self.model, messages = messages.len(), tools = tools.len()))]
    async fn stream(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<DeltaStream> {
        let request_messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>>>()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(request_messages)
            .temperature(self.temperature);
        if !tools.is_empty() {
            builder.tools(tools.iter().map(to_tool_definition).collect::<Vec<_>>());
        }
        let request = builder.build().map_err(|e| VidyaError::Model(e.to_string()))?;

        debug!("Starting chat completion stream");

        let stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| VidyaError::OpenAI(format!("Chat API error: {}", e)))?;

        Ok(stream
            .map(|item| {
                item.map(delta_from_response)
                    .map_err(|e| VidyaError::OpenAI(format!("Chat stream error: {}", e)))
            })
            .boxed())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn delta_from_response(response: CreateChatCompletionStreamResponse) -> ModelDelta {
    let Some(choice) = response.choices.into_iter().next() else {
        return ModelDelta::default();
    };

    let tool_calls = choice
        .delta
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|chunk| {
            let (name, arguments) = match chunk.function {
                Some(f) => (f.name, f.arguments),
                None => (None, None),
            };
            ToolCallDelta {
                index: chunk.index as usize,
                id: chunk.id,
                name,
                arguments,
            }
        })
        .collect();

    ModelDelta {
        content: choice.delta.content,
        tool_calls,
    }
}

fn to_tool_definition(spec: &ToolSpec) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: spec.name.clone(),
            description: Some(spec.description.clone()),
            parameters: Some(spec.parameters.clone()),
            strict: None,
        },
    }
}

fn to_request_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
    let built: ChatCompletionRequestMessage = match message {
        ChatMessage::System { content } => ChatCompletionRequestSystemMessageArgs::default()
            .content(content.clone())
            .build()
            .map_err(|e| VidyaError::Model(e.to_string()))?
            .into(),
        ChatMessage::User { content } => ChatCompletionRequestUserMessageArgs::default()
            .content(to_user_content(content))
            .build()
            .map_err(|e| VidyaError::Model(e.to_string()))?
            .into(),
        ChatMessage::Assistant {
            content,
            tool_calls,
        } => {
            let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
            if !content.is_empty() {
                builder.content(content.clone());
            }
            if !tool_calls.is_empty() {
                builder.tool_calls(
                    tool_calls
                        .iter()
                        .map(|c| ChatCompletionMessageToolCall {
                            id: c.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: c.name.clone(),
                                arguments: c.arguments.clone(),
                            },
                        })
                        .collect::<Vec<_>>(),
                );
            }
            builder
                .build()
                .map_err(|e| VidyaError::Model(e.to_string()))?
                .into()
        }
        ChatMessage::Tool {
            tool_call_id,
            content,
            ..
        } => ChatCompletionRequestToolMessageArgs::default()
            .tool_call_id(tool_call_id.clone())
            .content(content.clone())
            .build()
            .map_err(|e| VidyaError::Model(e.to_string()))?
            .into(),
    };

    Ok(built)
}

fn to_user_content(content: &MessageContent) -> ChatCompletionRequestUserMessageContent {
    match content {
        MessageContent::Text(text) => ChatCompletionRequestUserMessageContent::Text(text.clone()),
        MessageContent::Parts(parts) => ChatCompletionRequestUserMessageContent::Array(
            parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => ChatCompletionRequestUserMessageContentPart::Text(
                        ChatCompletionRequestMessageContentPartText { text: text.clone() },
                    ),
                    ContentPart::ImageUrl { image_url } => {
                        ChatCompletionRequestUserMessageContentPart::ImageUrl(
                            ChatCompletionRequestMessageContentPartImage {
                                image_url: ImageUrl {
                                    url: image_url.url.clone(),
                                    detail: None,
                                },
                            },
                        )
                    }
                })
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolCall;

    #[test]
    fn test_assistant_with_tool_calls_converts() {
        let message = ChatMessage::Assistant {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: "calculator".to_string(),
                arguments: r#"{"expression": "2+2"}"#.to_string(),
            }],
        };

        match to_request_message(&message).unwrap() {
            ChatCompletionRequestMessage::Assistant(assistant) => {
                let calls = assistant.tool_calls.unwrap();
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].function.name, "calculator");
            }
            other => panic!("Expected assistant message, got {:?}", other),
        }
    }

    #[test]
    fn test_tool_definition_carries_schema() {
        let spec = ToolSpec {
            name: "calculator".to_string(),
            description: "Evaluate an expression".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        };
        let tool = to_tool_definition(&spec);
        assert_eq!(tool.function.name, "calculator");
        assert!(tool.function.parameters.is_some());
    }
}
