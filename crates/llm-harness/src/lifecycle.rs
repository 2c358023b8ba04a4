use std::fmt;

use tracing::debug;

/// Lifecycle of a single streaming call.
///
/// `Idle → Connecting → Connected → Draining → Finished`, with `Errored` and
/// `Cancelled` reachable from any non-terminal state past `Idle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamState {
    Idle,
    Connecting,
    Connected,
    Draining,
    Finished,
    Errored,
    Cancelled,
}

impl StreamState {
    /// Returns true for states that admit no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Errored | Self::Cancelled)
    }

    /// Returns true when `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: StreamState) -> bool {
        use StreamState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Connected)
                | (Connected, Draining)
                | (Draining, Finished)
                | (Connecting | Connected | Draining, Errored)
                | (Connecting | Connected | Draining, Cancelled)
        )
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Draining => "draining",
            Self::Finished => "finished",
            Self::Errored => "errored",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Tracks the current `StreamState` of one stream.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    stream_id: uuid::Uuid,
    state: StreamState,
}

impl Lifecycle {
    pub(crate) fn new(stream_id: uuid::Uuid) -> Self {
        Self {
            stream_id,
            state: StreamState::Idle,
        }
    }

    pub(crate) fn state(&self) -> StreamState {
        self.state
    }

    /// Moves to `next`. Illegal transitions are ignored and return false, so
    /// late signals after a terminal state are harmless.
    pub(crate) fn transition(&mut self, next: StreamState) -> bool {
        if !self.state.can_transition_to(next) {
            debug!(
                stream_id = %self.stream_id,
                from = %self.state,
                to = %next,
                "ignoring stream state transition"
            );
            return false;
        }
        debug!(
            stream_id = %self.stream_id,
            from = %self.state,
            to = %next,
            "stream state transition"
        );
        self.state = next;
        true
    }
}
