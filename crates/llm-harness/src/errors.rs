use std::time::Duration;

/// Errors produced by a `Transport` implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// DNS/TCP/TLS failure or any other error before a response arrived.
    #[error("connect failed: {message}")]
    Connect { message: String },
    /// The response body could not be read any further.
    #[error("read failed: {message}")]
    Read { message: String },
}

impl TransportError {
    /// Creates a connection-establishment error.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    /// Creates a mid-body read error.
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read {
            message: message.into(),
        }
    }

    /// Returns the human-readable message for this error.
    pub fn message(&self) -> &str {
        match self {
            Self::Connect { message } | Self::Read { message } => message,
        }
    }
}

/// Terminal stream failure carried by `StreamEvent::Error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum StreamFailure {
    /// The connection dropped or the body could not be read mid-stream.
    #[error("transport interrupted: {message}")]
    Transport { message: String },
    /// The stream was cancelled through an `AbortHandle`.
    #[error("stream cancelled")]
    Cancelled,
}

impl From<TransportError> for StreamFailure {
    fn from(value: TransportError) -> Self {
        StreamFailure::Transport {
            message: value.message().to_string(),
        }
    }
}

/// Top-level error type for the public streaming API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HarnessError {
    /// Invalid provider configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid request or options passed to the client.
    #[error("validation error: {0}")]
    Validation(String),
    /// The connection could not be established.
    #[error("connection error: {0}")]
    Connection(String),
    /// The provider answered with a non-2xx status before streaming began.
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    /// No response status arrived within the connect timeout.
    #[error("no response within {0:?}")]
    ConnectTimeout(Duration),
    /// A started stream terminated with a failure.
    #[error(transparent)]
    StreamFailed(StreamFailure),
}

impl HarnessError {
    /// Returns the HTTP status code when the failure came from a non-2xx response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<StreamFailure> for HarnessError {
    fn from(value: StreamFailure) -> Self {
        HarnessError::StreamFailed(value)
    }
}

impl From<TransportError> for HarnessError {
    fn from(value: TransportError) -> Self {
        HarnessError::Connection(value.message().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_converts_to_stream_failure_with_message() {
        let failure = StreamFailure::from(TransportError::read("connection reset"));
        assert_eq!(
            failure,
            StreamFailure::Transport {
                message: "connection reset".into()
            }
        );
    }

    #[test]
    fn status_code_is_only_reported_for_status_errors() {
        let err = HarnessError::Status {
            status: 404,
            body: "missing".into(),
        };
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(HarnessError::Connection("dns".into()).status_code(), None);
    }
}
