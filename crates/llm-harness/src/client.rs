use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt as _;
use futures::stream::BoxStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument as _, debug, info, instrument, warn};

use crate::config::ProviderConfig;
use crate::errors::{HarnessError, StreamFailure, TransportError};
use crate::interpret::{RawEvent, interpret_frame};
use crate::lifecycle::{Lifecycle, StreamState};
use crate::normalize::Normalizer;
use crate::options::StreamOptions;
use crate::request::StreamRequest;
use crate::sse::{SseDecoder, SseItem};
use crate::stream::StreamEvent;
use crate::transport::{ByteStream, ReqwestTransport, Transport};

const ERROR_BODY_LIMIT: usize = 64 * 1024;

type ChunkResult = Result<bytes::Bytes, TransportError>;

/// Handle used to cancel a running stream from another task.
#[derive(Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation. Safe to call at any point, including after the
    /// stream finished.
    ///
    /// A consumer still reading sees a terminal
    /// `StreamEvent::Error` with `StreamFailure::Cancelled`.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

/// Entry point for streaming calls against an OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct StreamingClient {
    transport: Arc<dyn Transport>,
}

impl StreamingClient {
    /// Creates a client over an explicit transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Creates a client using `ReqwestTransport`.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, HarnessError> {
        Ok(Self::new(Arc::new(ReqwestTransport::new(config)?)))
    }

    /// Opens a stream.
    ///
    /// Connection failures, connect timeouts and non-2xx statuses are returned
    /// here as errors. Once this returns `Ok`, every later failure arrives as
    /// a terminal `StreamEvent::Error` inside the sequence.
    #[instrument(skip_all, fields(url = %request.url, stream_id))]
    pub async fn stream(
        &self,
        mut request: StreamRequest,
        mut options: StreamOptions,
    ) -> Result<StreamResponse, HarnessError> {
        if options.channel_capacity == 0 {
            return Err(HarnessError::Validation(
                "channel_capacity must be greater than 0".into(),
            ));
        }
        let mut warnings = options.sanitize();
        if let Some(warning) = request.normalize_stream_flag()? {
            warnings.push(warning);
        }
        for warning in &warnings {
            warn!("{warning}");
        }

        let stream_id = uuid::Uuid::new_v4();
        tracing::Span::current().record("stream_id", tracing::field::display(stream_id));
        let mut lifecycle = Lifecycle::new(stream_id);
        lifecycle.transition(StreamState::Connecting);
        info!("opening stream");

        let connect_timeout = options.connect_timeout();
        let response =
            match tokio::time::timeout(connect_timeout, self.transport.open_stream(&request)).await
            {
                Ok(Ok(response)) => response,
                Ok(Err(err)) => {
                    lifecycle.transition(StreamState::Errored);
                    warn!(error = %err, "stream connection failed");
                    return Err(HarnessError::from(err));
                }
                Err(_) => {
                    lifecycle.transition(StreamState::Errored);
                    warn!(?connect_timeout, "stream connect timed out");
                    return Err(HarnessError::ConnectTimeout(connect_timeout));
                }
            };

        if !response.is_success() {
            lifecycle.transition(StreamState::Errored);
            let status = response.status;
            let body = read_error_body(response.body, connect_timeout).await;
            warn!(status, "provider rejected stream request");
            return Err(HarnessError::Status { status, body });
        }
        lifecycle.transition(StreamState::Connected);

        let span = tracing::info_span!("event_stream", %stream_id);
        let (tx, rx) = mpsc::channel(options.channel_capacity);
        let pump = tokio::spawn(pump_body(response.body, tx).instrument(span.clone()));
        let (abort_tx, abort_rx) = watch::channel(false);

        let events = EventStream {
            stream_id,
            rx,
            pump: Some(pump),
            decoder: SseDecoder::default(),
            normalizer: Normalizer::new(options.policy()),
            lifecycle,
            pending: VecDeque::new(),
            idle_timeout: options.idle_timeout_duration(),
            finish_grace: options.finish_grace_duration(),
            abort_rx,
            abort_handle: AbortHandle { tx: abort_tx },
            span,
        };

        Ok(StreamResponse {
            events,
            warnings,
            request: request.redacted(),
            status: response.status,
            headers: response.headers,
        })
    }
}

/// Successful result of `StreamingClient::stream`.
pub struct StreamResponse {
    /// Normalized event sequence.
    pub events: EventStream,
    /// Non-fatal warnings about the request or options.
    pub warnings: Vec<String>,
    /// The request as sent, with credentials masked.
    pub request: StreamRequest,
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

/// Forward-only sequence of normalized events for one HTTP response.
///
/// Dropping it (or calling `close`) releases the connection. The sequence is
/// not restartable.
pub struct EventStream {
    stream_id: uuid::Uuid,
    rx: mpsc::Receiver<ChunkResult>,
    pump: Option<JoinHandle<()>>,
    decoder: SseDecoder,
    normalizer: Normalizer,
    lifecycle: Lifecycle,
    pending: VecDeque<StreamEvent>,
    idle_timeout: Duration,
    finish_grace: Duration,
    abort_rx: watch::Receiver<bool>,
    abort_handle: AbortHandle,
    span: tracing::Span,
}

impl EventStream {
    /// Returns the id used on log lines for this stream.
    pub fn stream_id(&self) -> uuid::Uuid {
        self.stream_id
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.lifecycle.state()
    }

    /// Returns a handle that can cancel the stream from another task.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for the next event. Returns `None` once the sequence ended.
    ///
    /// Once the provider sent a finish reason, trailing chunks are awaited
    /// for `StreamOptions::finish_grace` only, not the full idle timeout.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        let span = self.span.clone();
        self.advance().instrument(span).await
    }

    async fn advance(&mut self) -> Option<StreamEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            match self.lifecycle.state() {
                StreamState::Draining => {
                    self.lifecycle.transition(StreamState::Finished);
                    self.release_transport();
                    info!("stream finished");
                    return None;
                }
                state if state.is_terminal() => return None,
                _ => {}
            }

            let wait = if self.normalizer.has_pending_finish() {
                self.finish_grace
            } else {
                self.idle_timeout
            };
            tokio::select! {
                biased;
                changed = self.abort_rx.changed() => {
                    if changed.is_ok() && *self.abort_rx.borrow_and_update() {
                        info!("stream aborted");
                        self.release_transport();
                        self.lifecycle.transition(StreamState::Cancelled);
                        self.pending.extend(self.normalizer.fail(StreamFailure::Cancelled));
                    }
                }
                next = tokio::time::timeout(wait, self.rx.recv()) => {
                    self.on_receive(next);
                }
            }
        }
    }

    /// Stops the stream and releases the connection without emitting further
    /// events.
    pub fn close(&mut self) {
        self.release_transport();
        if self.lifecycle.transition(StreamState::Cancelled) {
            info!(parent: &self.span, "stream closed by caller");
        }
        self.pending.clear();
    }

    /// Drains the stream and returns the concatenated text.
    pub async fn collect_text(mut self) -> Result<String, HarnessError> {
        let mut text = String::new();
        while let Some(event) = self.next_event().await {
            if let StreamEvent::Error { error } = event {
                return Err(HarnessError::StreamFailed(error));
            }
            if let Some(content) = event.as_text() {
                text.push_str(content);
            }
        }
        Ok(text)
    }

    /// Adapts the sequence into a `futures::Stream`.
    pub fn into_stream(self) -> BoxStream<'static, StreamEvent> {
        futures::stream::unfold(self, |mut events| async move {
            let event = events.next_event().await?;
            Some((event, events))
        })
        .boxed()
    }

    fn on_receive(&mut self, next: Result<Option<ChunkResult>, tokio::time::error::Elapsed>) {
        match next {
            Ok(Some(Ok(chunk))) => {
                let items = self.decoder.push_chunk(&chunk);
                self.ingest(items);
                if self.normalizer.is_terminated() {
                    self.release_transport();
                    self.lifecycle.transition(StreamState::Draining);
                }
            }
            Ok(Some(Err(err))) => {
                warn!(error = %err, "stream interrupted");
                self.release_transport();
                let events = self.normalizer.fail(StreamFailure::from(err));
                let errored = events
                    .iter()
                    .any(|event| matches!(event, StreamEvent::Error { .. }));
                self.pending.extend(events);
                self.lifecycle.transition(if errored {
                    StreamState::Errored
                } else {
                    StreamState::Draining
                });
            }
            Ok(None) => {
                debug!("transport reached end of body");
                let items = self.decoder.flush();
                self.ingest(items);
                self.pending.extend(self.normalizer.end_of_stream());
                self.release_transport();
                self.lifecycle.transition(StreamState::Draining);
            }
            Err(_) if self.normalizer.has_pending_finish() => {
                debug!(finish_grace = ?self.finish_grace, "no trailing chunks after finish reason");
                self.complete_on_silence();
            }
            Err(_) if self.normalizer.has_progress() => {
                info!(idle_timeout = ?self.idle_timeout, "stream idle; treating as complete");
                self.complete_on_silence();
            }
            Err(_) => {
                debug!("no output yet; still waiting");
            }
        }
    }

    fn complete_on_silence(&mut self) {
        if self.decoder.has_buffered() {
            debug!("flushing partially received frame");
        }
        let items = self.decoder.flush();
        self.ingest(items);
        self.pending.extend(self.normalizer.idle_timeout());
        self.release_transport();
        self.lifecycle.transition(StreamState::Draining);
    }

    fn ingest(&mut self, items: Vec<SseItem>) {
        for item in items {
            let raw = match item {
                SseItem::Frame(frame) => {
                    debug!(event = ?frame.event, id = ?frame.id, "sse frame");
                    interpret_frame(&frame)
                }
                SseItem::Done => Some(RawEvent::Done),
            };
            if let Some(raw) = raw {
                self.pending.extend(self.normalizer.push(raw));
            }
        }
    }

    fn release_transport(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
            self.rx.close();
            debug!(parent: &self.span, "transport released");
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if !self.lifecycle.state().is_terminal() {
            self.close();
        }
        self.release_transport();
    }
}

// Feeds body chunks into the channel until the body ends, fails, or the
// consumer goes away. Dropping `body` on return closes the connection.
async fn pump_body(mut body: ByteStream, tx: mpsc::Sender<ChunkResult>) {
    loop {
        tokio::select! {
            _ = tx.closed() => {
                debug!("consumer gone; stopping body reader");
                return;
            }
            next = body.next() => match next {
                Some(item) => {
                    let failed = item.is_err();
                    if tx.send(item).await.is_err() || failed {
                        return;
                    }
                }
                None => return,
            }
        }
    }
}

async fn read_error_body(mut body: ByteStream, wait: Duration) -> String {
    let mut buf = Vec::new();
    let read = async {
        while let Some(Ok(chunk)) = body.next().await {
            buf.extend_from_slice(&chunk);
            if buf.len() >= ERROR_BODY_LIMIT {
                break;
            }
        }
    };
    let _ = tokio::time::timeout(wait, read).await;
    buf.truncate(ERROR_BODY_LIMIT);
    String::from_utf8_lossy(&buf).into_owned()
}
