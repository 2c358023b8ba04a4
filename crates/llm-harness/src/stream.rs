use crate::errors::StreamFailure;

/// Normalized stream events yielded by `EventStream`.
///
/// A stream yields any number of `TextDelta`, `ToolCall` and `Metadata`
/// events and then at most one terminal event (`Finish` or `Error`), which is
/// always the last one.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// Fragment of generated text, concatenated in arrival order.
    TextDelta { content: String },
    /// Complete tool invocation. `arguments` is the raw JSON-encoded string.
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },
    /// Terminal success marker. `reason` is never empty.
    Finish { reason: String },
    /// Opaque provider payload that did not classify as text, tool or finish.
    Metadata { data: serde_json::Value },
    /// Terminal failure.
    Error { error: StreamFailure },
}

impl StreamEvent {
    /// Returns true for `Finish` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish { .. } | Self::Error { .. })
    }

    /// Returns the text fragment for `TextDelta` events.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::TextDelta { content } => Some(content),
            _ => None,
        }
    }
}
