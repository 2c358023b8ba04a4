//! Classification of SSE `data` payloads into provisional events.
//!
//! OpenAI-compatible providers disagree on where text lives, so a decoded
//! payload is checked against several shapes in a fixed priority order and
//! the first match wins.

use serde_json::Value;

use crate::sse::{DONE_SENTINEL, SseFrame};

/// Provisional event produced from one payload, before stream policy runs.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    /// Text fragment. `finish_reason` is set when the same payload also
    /// closed the choice. `payload` is the decoded JSON it came from, if any.
    TextDelta {
        content: String,
        finish_reason: Option<String>,
        payload: Option<Value>,
    },
    /// Partial `delta.tool_calls` entries plus the payload that carried them.
    ToolCallFragment { fragments: Vec<Value>, payload: Value },
    /// Explicit `finish_reason` from the provider.
    Finish { reason: String },
    /// Anything that did not classify.
    Metadata(Value),
    /// `[DONE]` terminator.
    Done,
}

/// Interprets a decoded SSE frame.
pub fn interpret_frame(frame: &SseFrame) -> Option<RawEvent> {
    interpret_payload(&frame.data)
}

/// Interprets one `data` payload. Never fails: text that is not JSON is
/// returned as a text fragment, and blank payloads yield nothing.
pub fn interpret_payload(data: &str) -> Option<RawEvent> {
    let trimmed = data.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed == DONE_SENTINEL {
        return Some(RawEvent::Done);
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => Some(classify(value)),
        Err(_) => Some(RawEvent::TextDelta {
            content: data.to_string(),
            finish_reason: None,
            payload: None,
        }),
    }
}

fn classify(value: Value) -> RawEvent {
    let finish_reason = non_empty_str(&value, "/choices/0/finish_reason");
    if let Some(content) = non_empty_str(&value, "/choices/0/delta/content") {
        return RawEvent::TextDelta {
            content,
            finish_reason,
            payload: Some(value),
        };
    }
    if let Some(tool_calls) = value
        .pointer("/choices/0/delta/tool_calls")
        .filter(|v| !v.is_null())
    {
        let fragments = match tool_calls {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        };
        return RawEvent::ToolCallFragment {
            fragments,
            payload: value,
        };
    }
    if let Some(reason) = finish_reason {
        return RawEvent::Finish { reason };
    }
    if let Some(content) = ["/content", "/text", "/message/content"]
        .iter()
        .find_map(|pointer| non_empty_str(&value, pointer))
    {
        return RawEvent::TextDelta {
            content,
            finish_reason: None,
            payload: Some(value),
        };
    }
    RawEvent::Metadata(value)
}

fn non_empty_str(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}
