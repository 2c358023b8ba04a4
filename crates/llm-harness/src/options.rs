use std::time::Duration;

use crate::normalize::NormalizerPolicy;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_IDLE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_FINISH_GRACE_MS: u64 = 250;
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Per-call streaming behavior.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    /// Bounded wait for the response status and headers.
    pub timeout_ms: u64,
    /// Bounded wait for each subsequent body chunk.
    pub idle_timeout_ms: u64,
    /// Wait for trailing chunks (usage) once the provider sent a finish
    /// reason. Capped by `idle_timeout_ms`.
    pub finish_grace_ms: u64,
    /// Synthesize a finish when the provider closes without one.
    pub detect_end_of_stream: bool,
    /// Drop metadata events that carry no content.
    pub filter_metadata: bool,
    /// Reassemble streamed tool-call fragments into `ToolCall` events.
    pub assemble_tool_calls: bool,
    /// Follow each JSON text delta with its raw payload as metadata.
    pub retain_raw_payload: bool,
    /// Chunks buffered between the transport reader task and the decoder.
    pub channel_capacity: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            finish_grace_ms: DEFAULT_FINISH_GRACE_MS,
            detect_end_of_stream: false,
            filter_metadata: false,
            assemble_tool_calls: false,
            retain_raw_payload: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl StreamOptions {
    /// Sets the connect timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = duration_ms(timeout);
        self
    }

    /// Sets the idle timeout between chunks.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout_ms = duration_ms(timeout);
        self
    }

    /// Sets how long to wait for trailing chunks after a finish reason.
    pub fn finish_grace(mut self, grace: Duration) -> Self {
        self.finish_grace_ms = duration_ms(grace);
        self
    }

    pub fn detect_end_of_stream(mut self, enabled: bool) -> Self {
        self.detect_end_of_stream = enabled;
        self
    }

    pub fn filter_metadata(mut self, enabled: bool) -> Self {
        self.filter_metadata = enabled;
        self
    }

    pub fn assemble_tool_calls(mut self, enabled: bool) -> Self {
        self.assemble_tool_calls = enabled;
        self
    }

    pub fn retain_raw_payload(mut self, enabled: bool) -> Self {
        self.retain_raw_payload = enabled;
        self
    }

    /// Sets the reader-to-decoder channel capacity. Must be non-zero.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn idle_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn finish_grace_duration(&self) -> Duration {
        Duration::from_millis(self.finish_grace_ms.min(self.idle_timeout_ms))
    }

    pub(crate) fn policy(&self) -> NormalizerPolicy {
        NormalizerPolicy {
            detect_end_of_stream: self.detect_end_of_stream,
            filter_metadata: self.filter_metadata,
            assemble_tool_calls: self.assemble_tool_calls,
            retain_raw_payload: self.retain_raw_payload,
        }
    }

    /// Replaces unusable values with defaults and returns a warning for each.
    pub(crate) fn sanitize(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.timeout_ms == 0 {
            self.timeout_ms = DEFAULT_TIMEOUT_MS;
            warnings.push(format!(
                "unsupported setting ignored: timeout_ms=0, using {DEFAULT_TIMEOUT_MS}"
            ));
        }
        if self.idle_timeout_ms == 0 {
            self.idle_timeout_ms = DEFAULT_IDLE_TIMEOUT_MS;
            warnings.push(format!(
                "unsupported setting ignored: idle_timeout_ms=0, using {DEFAULT_IDLE_TIMEOUT_MS}"
            ));
        }
        warnings
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
