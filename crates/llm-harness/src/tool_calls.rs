use std::collections::BTreeMap;

use serde_json::Value;

use crate::stream::StreamEvent;

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Merges streamed `delta.tool_calls` fragments into complete tool calls.
///
/// Fragments are keyed by their `index`. The first non-empty `id` and
/// `function.name` win; `function.arguments` pieces are concatenated.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    calls: BTreeMap<u64, PartialToolCall>,
    last_index: Option<u64>,
}

impl ToolCallAssembler {
    /// Adds one fragment.
    pub fn push(&mut self, fragment: &Value) {
        let id = fragment.get("id").and_then(Value::as_str).unwrap_or("");
        let index = match fragment.get("index").and_then(Value::as_u64) {
            Some(index) => index,
            None => self.infer_index(id),
        };
        self.last_index = Some(index);

        let call = self.calls.entry(index).or_default();
        if call.id.is_empty() && !id.is_empty() {
            call.id = id.to_string();
        }
        let function = fragment.get("function");
        if let Some(name) = function
            .and_then(|f| f.get("name"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            && call.name.is_empty()
        {
            call.name = name.to_string();
        }
        if let Some(arguments) = function
            .and_then(|f| f.get("arguments"))
            .and_then(Value::as_str)
        {
            call.arguments.push_str(arguments);
        }
    }

    /// Returns true when no fragment has been seen.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Drains the assembled calls in index order.
    pub fn drain(&mut self) -> Vec<StreamEvent> {
        self.last_index = None;
        std::mem::take(&mut self.calls)
            .into_iter()
            .map(|(index, call)| StreamEvent::ToolCall {
                id: if call.id.is_empty() {
                    format!("call_{index}")
                } else {
                    call.id
                },
                name: call.name,
                arguments: call.arguments,
            })
            .collect()
    }

    // Fragments without an index continue the previous call unless they
    // introduce a new id.
    fn infer_index(&self, id: &str) -> u64 {
        let Some(last) = self.last_index else {
            return 0;
        };
        let starts_new = !id.is_empty()
            && self
                .calls
                .get(&last)
                .is_some_and(|call| !call.id.is_empty() && call.id != id);
        if starts_new {
            self.calls.keys().next_back().map_or(0, |max| max + 1)
        } else {
            last
        }
    }
}
