//! Streaming response accumulator.

use super::{ModelDelta, ToolCall};
use crate::error::Result;
use futures::{Stream, StreamExt};
use std::collections::BTreeMap;

/// A model response assembled from streamed deltas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccumulatedResponse {
    /// Non-empty text fragments in arrival order.
    pub fragments: Vec<String>,
    /// Completed tool calls ordered by their stream index.
    pub tool_calls: Vec<ToolCall>,
}

impl AccumulatedResponse {
    /// Full response text.
    pub fn text(&self) -> String {
        self.fragments.concat()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Accumulates streaming deltas into a complete response.
///
/// Text fragments are appended in order. Tool call deltas are keyed by index,
/// which may be sparse or interleaved: `id` and `name` overwrite when present,
/// `arguments` fragments are appended.
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    fragments: Vec<String>,
    tool_calls: BTreeMap<usize, ToolCall>,
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one delta into the response.
    pub fn push(&mut self, delta: ModelDelta) {
        if let Some(text) = delta.content {
            if !text.is_empty() {
                self.fragments.push(text);
            }
        }

        for part in delta.tool_calls {
            let call = self.tool_calls.entry(part.index).or_insert_with(|| ToolCall {
                id: String::new(),
                name: String::new(),
                arguments: String::new(),
            });

            if let Some(id) = part.id {
                call.id = id;
            }
            if let Some(name) = part.name {
                call.name = name;
            }
            if let Some(arguments) = part.arguments {
                call.arguments.push_str(&arguments);
            }
        }
    }

    /// Finish accumulation. Calls that never received a name are dropped.
    pub fn finish(self) -> AccumulatedResponse {
        let tool_calls = self
            .tool_calls
            .into_values()
            .filter(|c| !c.name.is_empty())
            .collect();

        AccumulatedResponse {
            fragments: self.fragments,
            tool_calls,
        }
    }

    /// Accumulate an entire stream into a response.
    pub async fn accumulate_stream<S>(mut stream: S) -> Result<AccumulatedResponse>
    where
        S: Stream<Item = Result<ModelDelta>> + Unpin,
    {
        let mut accumulator = Self::new();
        while let Some(delta) = stream.next().await {
            accumulator.push(delta?);
        }
        Ok(accumulator.finish())
    }
}
