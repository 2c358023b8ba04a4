//! Common imports for typical streaming usage.
pub use crate::{
    AbortHandle, ChatMessage, ChatOptions, EventStream, HarnessError, ProviderConfig,
    StreamEvent, StreamFailure, StreamOptions, StreamRequest, StreamResponse, StreamState,
    StreamingClient,
};
