//! Chat relay controller.
//!
//! One controller per deployment profile. It validates the request, then
//! either makes a single buffered upstream call or opens an event stream
//! that interleaves heartbeats with upstream events until `[DONE]`.
//!
//! # Streaming session
//!
//! ```text
//! OPENING ──► WAITING_UPSTREAM ──► RELAYING ──► CLOSED
//!                   │                  │
//!                   └── error frame ───┴──► [DONE]
//! ```
//!
//! Every path into `CLOSED` writes at most one error frame followed by
//! exactly one `[DONE]`, unless the client has already gone away.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use tokio::time::error::Elapsed;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use coachrelay_core::{
    API_KEY_ENV, ApiKey, ChatRequest, RelayError, RelaySettings, UpstreamByteStream, UpstreamCall,
    UpstreamFailure, UpstreamPort, UpstreamReply, UpstreamStreamError,
};

use crate::error::HttpError;
use crate::framing::{EventSplitter, FrameEncoder, data_frame};

/// Relay for one deployment profile.
#[derive(Debug, Clone)]
pub struct RelayController {
    settings: Arc<RelaySettings>,
    upstream: Arc<dyn UpstreamPort>,
    shutdown: CancellationToken,
}

impl RelayController {
    pub fn new(settings: Arc<RelaySettings>, upstream: Arc<dyn UpstreamPort>) -> Self {
        Self {
            settings,
            upstream,
            shutdown: CancellationToken::new(),
        }
    }

    /// Open sessions end with `[DONE]` when `shutdown` is cancelled.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Handle one inbound chat request.
    ///
    /// Nothing reaches upstream unless the method, body and credential all
    /// check out.
    pub async fn handle_chat_request(&self, method: &Method, body: Bytes) -> Response {
        // Routed preflights never get here; direct callers get a bare answer.
        if method == Method::OPTIONS {
            return StatusCode::NO_CONTENT.into_response();
        }

        let request = match self.validate(method, &body) {
            Ok(request) => request,
            Err(err) => {
                debug!(reason = err.reason(), error = %err, "Rejected chat request");
                return HttpError::from(err).into_response();
            }
        };

        let Some(api_key) = self.settings.api_key.clone() else {
            warn!("Chat request refused: {API_KEY_ENV} is not configured");
            return HttpError::from(RelayError::MissingCredential(API_KEY_ENV)).into_response();
        };

        if request.stream {
            self.open_stream(request, api_key)
        } else {
            self.complete(request, api_key).await
        }
    }

    fn validate(&self, method: &Method, body: &[u8]) -> Result<ChatRequest, RelayError> {
        if method != Method::POST {
            return Err(RelayError::MethodNotAllowed(method.to_string()));
        }
        ChatRequest::parse(body, &self.settings.request_defaults())
    }

    /// Non-streaming path: one buffered exchange under the request deadline.
    async fn complete(&self, request: ChatRequest, api_key: ApiKey) -> Response {
        let started = Instant::now();
        let deadline = self.settings.request_deadline;
        let model = request.model.clone();
        let call = UpstreamCall::new(api_key, request.to_upstream_body(false), deadline);

        // Bounds the whole exchange, including buffering of a streamed body.
        let outcome = match tokio::time::timeout(deadline, self.exchange(call)).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::UpstreamTimeout(deadline)),
        };

        match outcome {
            Ok((status, body)) => {
                info!(
                    profile = %self.settings.profile,
                    model = %model,
                    stream = false,
                    status,
                    bytes = body.len(),
                    elapsed_ms = elapsed_ms(started),
                    "Relayed chat completion"
                );
                json_passthrough(status, body)
            }
            Err(err) => {
                warn!(
                    profile = %self.settings.profile,
                    model = %model,
                    stream = false,
                    reason = err.reason(),
                    status = err.suggested_status_code(),
                    elapsed_ms = elapsed_ms(started),
                    "Chat completion failed: {err}"
                );
                HttpError::from(err).into_response()
            }
        }
    }

    async fn exchange(&self, call: UpstreamCall) -> Result<(u16, Bytes), RelayError> {
        match self.upstream.send(call).await? {
            UpstreamReply::Complete { status, body } => Ok((status, body)),
            UpstreamReply::Streaming(stream) => Ok((200, collect_body(stream).await?)),
        }
    }

    /// Streaming path: headers go out now, the body is the session.
    fn open_stream(&self, request: ChatRequest, api_key: ApiKey) -> Response {
        let session = StreamSession {
            id: Uuid::new_v4(),
            settings: Arc::clone(&self.settings),
            upstream: Arc::clone(&self.upstream),
            cancel: self.shutdown.child_token(),
            request,
            api_key,
        };

        Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .header(CONNECTION, "keep-alive")
            .header("x-accel-buffering", "no") // Disable nginx buffering
            .body(Body::from_stream(session.run()))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

fn json_passthrough(status: u16, body: Bytes) -> Response {
    Response::builder()
        .status(StatusCode::from_u16(status).unwrap_or(StatusCode::OK))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn collect_body(mut stream: UpstreamByteStream) -> Result<Bytes, RelayError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| RelayError::UpstreamNetwork(e.to_string()))?;
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// One streaming relay session.
struct StreamSession {
    id: Uuid,
    settings: Arc<RelaySettings>,
    upstream: Arc<dyn UpstreamPort>,
    cancel: CancellationToken,
    request: ChatRequest,
    api_key: ApiKey,
}

/// What woke the session loop.
enum Step {
    Cancelled,
    BudgetExhausted,
    Heartbeat,
    Reply(Result<Result<UpstreamReply, UpstreamFailure>, Elapsed>),
    Chunk(Option<Result<Bytes, UpstreamStreamError>>),
    Idle,
}

#[derive(Debug, Default)]
struct SessionStats {
    bytes: usize,
    frames: usize,
    heartbeats: usize,
}

impl StreamSession {
    fn run(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        stream! {
            let StreamSession { id, settings, upstream, cancel, request, api_key } = self;
            let started = Instant::now();
            // Cancels the session token when the body is dropped, including on
            // client disconnect, which ends the upstream byte stream.
            let guard: DropGuard = cancel.clone().drop_guard();
            let mut encoder = FrameEncoder::new(settings.heartbeat_style);
            let mut splitter = EventSplitter::new();
            let mut stats = SessionStats::default();

            let heartbeat_every = settings.heartbeat_interval;
            let stream_deadline = settings.stream_deadline;
            let idle_timeout = settings.stream_idle_timeout;
            let session_budget = settings.session_budget;

            info!(
                session_id = %id,
                profile = %settings.profile,
                model = %request.model,
                stream = true,
                "Relay session opened"
            );

            // OPENING: liveness before any upstream byte
            stats.heartbeats += 1;
            yield Ok::<Bytes, Infallible>(encoder.heartbeat());

            let mut heartbeat = interval_at(Instant::now() + heartbeat_every, heartbeat_every);
            heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let budget = sleep(session_budget.unwrap_or(Duration::MAX));
            tokio::pin!(budget);
            let idle = sleep(idle_timeout.unwrap_or(Duration::MAX));
            tokio::pin!(idle);

            let call = UpstreamCall::new(api_key, request.to_upstream_body(true), stream_deadline)
                .with_cancel(cancel.clone());
            let send = tokio::time::timeout(stream_deadline, upstream.send(call));
            tokio::pin!(send);

            debug!(session_id = %id, "WAITING_UPSTREAM");
            let mut body: Option<UpstreamByteStream> = None;

            let failure: Option<RelayError> = loop {
                let step = if let Some(open) = body.as_mut() {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => Step::Cancelled,
                        () = &mut budget, if session_budget.is_some() => Step::BudgetExhausted,
                        chunk = open.next() => Step::Chunk(chunk),
                        () = &mut idle, if idle_timeout.is_some() => Step::Idle,
                        _ = heartbeat.tick() => Step::Heartbeat,
                    }
                } else {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => Step::Cancelled,
                        () = &mut budget, if session_budget.is_some() => Step::BudgetExhausted,
                        reply = &mut send => Step::Reply(reply),
                        _ = heartbeat.tick() => Step::Heartbeat,
                    }
                };

                match step {
                    Step::Cancelled => {
                        debug!(session_id = %id, "Session cancelled by shutdown");
                        break None;
                    }
                    Step::BudgetExhausted => {
                        break session_budget.map(RelayError::SessionBudgetExceeded);
                    }
                    Step::Heartbeat => {
                        stats.heartbeats += 1;
                        yield Ok(encoder.heartbeat());
                    }
                    Step::Reply(Ok(Ok(UpstreamReply::Streaming(open)))) => {
                        debug!(session_id = %id, "RELAYING");
                        body = Some(open);
                        if let Some(limit) = idle_timeout {
                            idle.as_mut().reset(Instant::now() + limit);
                        }
                    }
                    Step::Reply(Ok(Ok(UpstreamReply::Complete { body: document, .. }))) => {
                        // Upstream ignored `stream: true`; relay the document as one event.
                        stats.bytes += document.len();
                        stats.frames += 1;
                        yield Ok(data_frame(String::from_utf8_lossy(&document).trim()));
                        break None;
                    }
                    Step::Reply(Ok(Err(failure))) => break Some(failure.into()),
                    Step::Reply(Err(_)) => break Some(RelayError::UpstreamTimeout(stream_deadline)),
                    Step::Chunk(Some(Ok(chunk))) => {
                        if let Some(limit) = idle_timeout {
                            idle.as_mut().reset(Instant::now() + limit);
                        }
                        let ready = splitter.push(&chunk);
                        if let Some(events) = ready.bytes {
                            stats.bytes += events.len();
                            stats.frames += 1;
                            heartbeat.reset();
                            yield Ok(events);
                        }
                        if ready.saw_done {
                            break None;
                        }
                        if ready.too_large {
                            break Some(RelayError::StreamInterrupted(format!(
                                "upstream event exceeded {} bytes without a terminator",
                                splitter.limit()
                            )));
                        }
                    }
                    Step::Chunk(Some(Err(e))) => break Some(RelayError::StreamInterrupted(e.0)),
                    Step::Chunk(None) => {
                        if let Some(tail) = splitter.finish() {
                            stats.bytes += tail.len();
                            stats.frames += 1;
                            yield Ok(tail);
                        }
                        break None;
                    }
                    Step::Idle => break idle_timeout.map(RelayError::UpstreamIdle),
                }
            };

            // CLOSED: drop timers and the upstream body before the final frames
            drop(body);
            if let Some(err) = &failure {
                warn!(
                    session_id = %id,
                    reason = err.reason(),
                    elapsed_ms = elapsed_ms(started),
                    "Relay session failed: {err}"
                );
                yield Ok(encoder.error(err));
            }
            if let Some(done) = encoder.done() {
                yield Ok(done);
            }

            info!(
                session_id = %id,
                bytes = stats.bytes,
                frames = stats.frames,
                heartbeats = stats.heartbeats,
                failed = failure.is_some(),
                elapsed_ms = elapsed_ms(started),
                "Relay session closed"
            );
            drop(guard);
        }
    }
}
