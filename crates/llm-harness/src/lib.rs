//! Streaming client for OpenAI-compatible chat completion APIs.
//!
//! Raw HTTP body chunks flow through an SSE decoder, a payload interpreter
//! that tolerates several provider dialects, and a normalizer that enforces
//! "at most one terminal event, always last". Callers pull the resulting
//! `StreamEvent`s one at a time.
//!
//! # Usage
//!
//! ```no_run
//! use llm_harness::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), HarnessError> {
//! let config = ProviderConfig::from_env()?;
//! let client = StreamingClient::from_config(&config)?;
//! let request = StreamRequest::chat(
//!     &config,
//!     &[ChatMessage::user("Say hello")],
//!     &ChatOptions::new("gpt-4o-mini"),
//! )?;
//!
//! let mut response = client.stream(request, StreamOptions::default()).await?;
//! while let Some(event) = response.events.next_event().await {
//!     match event {
//!         StreamEvent::TextDelta { content } => print!("{content}"),
//!         StreamEvent::Finish { reason } => println!("\n[{reason}]"),
//!         StreamEvent::Error { error } => eprintln!("stream error: {error}"),
//!         StreamEvent::ToolCall { .. } | StreamEvent::Metadata { .. } => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Streaming façade, event sequence and cancellation handle.
pub mod client;
/// Endpoint configuration.
pub mod config;
/// Public error types.
pub mod errors;
/// Payload classification into provisional events.
pub mod interpret;
/// Stream lifecycle states.
pub mod lifecycle;
/// Stream-wide event policy.
pub mod normalize;
/// Process-wide logging setup.
pub mod observability;
/// Per-call streaming options.
pub mod options;
/// Common imports for typical usage.
pub mod prelude;
/// Request body building and the outgoing request type.
pub mod request;
/// SSE frame decoder.
pub mod sse;
/// Normalized public stream events.
pub mod stream;
/// Tool-call fragment reassembly.
pub mod tool_calls;
/// HTTP transport seam.
pub mod transport;

pub use client::{AbortHandle, EventStream, StreamResponse, StreamingClient};
pub use config::ProviderConfig;
pub use errors::{HarnessError, StreamFailure, TransportError};
pub use lifecycle::StreamState;
pub use options::StreamOptions;
pub use request::{ChatMessage, ChatOptions, StreamRequest, build_chat_request};
pub use stream::StreamEvent;
pub use transport::{ByteStream, ReqwestTransport, Transport, TransportResponse};
