//! Streaming events and their SSE wire form.

use crate::tools::Source;
use serde::Serialize;

/// Terminal marker written in place of a JSON payload.
pub const DONE_MARKER: &str = "[DONE]";

/// One event in a turn's output stream.
///
/// Serialized as `{"type": "<kind>", "content": ...}`; [`StreamEvent::Done`]
/// is written as the literal [`DONE_MARKER`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A tool is about to run.
    ToolUsage(String),
    /// Answer text from a response that needed no tools.
    Content(String),
    /// Answer text generated after tool use.
    FinalContent(String),
    Error(String),
    /// Citations gathered during the turn.
    Source(Vec<Source>),
    Done,
}

impl StreamEvent {
    /// Payload of the SSE `data:` field.
    pub fn data(&self) -> String {
        match self {
            StreamEvent::Done => DONE_MARKER.to_string(),
            event => serde_json::to_string(event).unwrap_or_else(|e| {
                format!(r#"{{"type":"error","content":"Failed to encode event: {}"}}"#, e)
            }),
        }
    }

    /// Full SSE frame, including the blank-line terminator.
    pub fn to_sse(&self) -> String {
        format!("data: {}\n\n", self.data())
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StreamEvent::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_form() {
        assert_eq!(
            StreamEvent::ToolUsage("Using the Calculator".into()).to_sse(),
            "data: {\"type\":\"tool_usage\",\"content\":\"Using the Calculator\"}\n\n"
        );
        assert_eq!(
            StreamEvent::FinalContent("नमस्ते".into()).data(),
            r#"{"type":"final_content","content":"नमस्ते"}"#
        );
        assert_eq!(StreamEvent::Done.to_sse(), "data: [DONE]\n\n");
    }

    #[test]
    fn test_source_content_is_array() {
        let event = StreamEvent::Source(vec![Source {
            document_name: "MF.pdf".into(),
            page_number: 3,
            excerpt: "NAV".into(),
        }]);
        let value: serde_json::Value = serde_json::from_str(&event.data()).unwrap();
        assert_eq!(value["type"], "source");
        assert_eq!(value["content"][0]["page_number"], 3);
    }
}
