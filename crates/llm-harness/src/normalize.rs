//! Stream-wide policy applied on top of interpreted payloads.
//!
//! The normalizer owns the "at most one terminal event, always last"
//! invariant. A provisional finish is held back until the stream drains so
//! trailing usage chunks can still be delivered ahead of it.

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::StreamFailure;
use crate::interpret::RawEvent;
use crate::stream::StreamEvent;
use crate::tool_calls::ToolCallAssembler;

/// Finish reason used for the `[DONE]` sentinel when no explicit reason arrived.
pub const DONE_FINISH_REASON: &str = "stop";
/// Finish reason used when a finish is synthesized at end of stream or on idle.
pub const SYNTHESIZED_FINISH_REASON: &str = "complete";

const ENVELOPE_KEYS: [&str; 6] = [
    "id",
    "object",
    "created",
    "model",
    "system_fingerprint",
    "choices",
];

/// Per-stream post-processing switches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NormalizerPolicy {
    /// Synthesize a finish when the source closes without one.
    pub detect_end_of_stream: bool,
    /// Drop metadata that carries no usable signal.
    pub filter_metadata: bool,
    /// Reassemble `delta.tool_calls` fragments into `ToolCall` events.
    pub assemble_tool_calls: bool,
    /// Follow every JSON-sourced text delta with its raw payload as metadata.
    pub retain_raw_payload: bool,
}

/// Applies `NormalizerPolicy` and the terminal-event invariant to one stream.
#[derive(Debug)]
pub struct Normalizer {
    policy: NormalizerPolicy,
    pending_finish: Option<String>,
    terminated: bool,
    produced_text: bool,
    tool_calls: ToolCallAssembler,
}

impl Normalizer {
    pub fn new(policy: NormalizerPolicy) -> Self {
        Self {
            policy,
            pending_finish: None,
            terminated: false,
            produced_text: false,
            tool_calls: ToolCallAssembler::default(),
        }
    }

    /// Returns true once a terminal event was emitted or the stream was closed.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Returns true once text or tool calls were produced or the provider
    /// signalled a finish. Idle-timeout completion only applies past this point.
    pub fn has_progress(&self) -> bool {
        self.produced_text || self.pending_finish.is_some() || !self.tool_calls.is_empty()
    }

    /// Returns true while a provider finish reason is held back.
    pub fn has_pending_finish(&self) -> bool {
        !self.terminated && self.pending_finish.is_some()
    }

    /// Maps one provisional event to zero or more standardized events.
    pub fn push(&mut self, raw: RawEvent) -> Vec<StreamEvent> {
        if self.terminated {
            debug!(?raw, "dropping event after stream termination");
            return Vec::new();
        }
        match raw {
            RawEvent::TextDelta {
                content,
                finish_reason,
                payload,
            } => {
                self.produced_text = true;
                if let Some(reason) = finish_reason {
                    self.record_finish(reason);
                }
                let mut events = vec![StreamEvent::TextDelta { content }];
                if self.policy.retain_raw_payload
                    && let Some(data) = payload
                {
                    events.push(StreamEvent::Metadata { data });
                }
                events
            }
            RawEvent::ToolCallFragment { fragments, payload } => {
                if self.policy.assemble_tool_calls {
                    for fragment in &fragments {
                        self.tool_calls.push(fragment);
                    }
                    Vec::new()
                } else {
                    vec![StreamEvent::Metadata { data: payload }]
                }
            }
            RawEvent::Finish { reason } => {
                self.record_finish(reason);
                Vec::new()
            }
            RawEvent::Metadata(data) => {
                if self.policy.filter_metadata && !carries_signal(&data) {
                    Vec::new()
                } else {
                    vec![StreamEvent::Metadata { data }]
                }
            }
            RawEvent::Done => self.finish(DONE_FINISH_REASON),
        }
    }

    /// Called when the source ends without a `[DONE]` sentinel.
    pub fn end_of_stream(&mut self) -> Vec<StreamEvent> {
        if self.terminated {
            return Vec::new();
        }
        if self.pending_finish.is_some() || self.policy.detect_end_of_stream {
            return self.finish(SYNTHESIZED_FINISH_REASON);
        }
        debug!("source closed without a finish");
        self.terminated = true;
        self.tool_calls.drain()
    }

    /// Called when the idle window elapsed after progress was made.
    pub fn idle_timeout(&mut self) -> Vec<StreamEvent> {
        self.finish(SYNTHESIZED_FINISH_REASON)
    }

    /// Called on a mid-stream transport failure or cancellation.
    pub fn fail(&mut self, error: StreamFailure) -> Vec<StreamEvent> {
        if self.terminated {
            return Vec::new();
        }
        if self.pending_finish.is_some() && error != StreamFailure::Cancelled {
            warn!(%error, "transport failed after provider finish; completing stream");
            return self.finish(SYNTHESIZED_FINISH_REASON);
        }
        self.terminated = true;
        vec![StreamEvent::Error { error }]
    }

    fn record_finish(&mut self, reason: String) {
        if self.pending_finish.is_none() {
            self.pending_finish = Some(reason);
        } else {
            debug!(dropped = %reason, "duplicate finish reason dropped");
        }
    }

    fn finish(&mut self, fallback: &str) -> Vec<StreamEvent> {
        if self.terminated {
            return Vec::new();
        }
        self.terminated = true;
        let reason = self
            .pending_finish
            .take()
            .unwrap_or_else(|| fallback.to_string());
        let mut events = self.tool_calls.drain();
        events.push(StreamEvent::Finish { reason });
        events
    }
}

/// Returns false for payloads with no content: empty `choices`, deltas that
/// only carry a role, and nothing outside the standard envelope.
pub fn carries_signal(value: &Value) -> bool {
    let Some(map) = value.as_object() else {
        return !is_blank(value);
    };
    let extra = map
        .iter()
        .any(|(key, v)| !ENVELOPE_KEYS.contains(&key.as_str()) && !is_blank(v));
    let choices = map
        .get("choices")
        .and_then(Value::as_array)
        .is_some_and(|choices| choices.iter().any(choice_carries_signal));
    extra || choices
}

fn choice_carries_signal(choice: &Value) -> bool {
    let delta = choice
        .get("delta")
        .and_then(Value::as_object)
        .is_some_and(|delta| {
            delta
                .iter()
                .any(|(key, v)| key != "role" && !is_blank(v))
        });
    let message = choice.get("message").is_some_and(|m| !is_blank(m));
    let finish = choice.get("finish_reason").is_some_and(|f| !is_blank(f));
    delta || message || finish
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.iter().all(is_blank),
        Value::Object(map) => map.values().all(is_blank),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
