//! Shared fixtures for coachrelay-proxy integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use bytes::Bytes;
use futures_util::StreamExt;
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;

use coachrelay_core::{
    ApiKey, DeploymentProfile, RelaySettings, TextExtractionService, UpstreamCall,
    UpstreamChatBody, UpstreamFailure, UpstreamPort, UpstreamReply, UpstreamStreamError,
};
use coachrelay_proxy::{build_state, create_router};

/// The one reply the test upstream gives.
#[derive(Debug, Clone)]
pub enum Script {
    Complete(&'static str),
    HttpError(u16, &'static str),
    NetworkError,
    /// Never answers.
    Hang,
    /// Waits `delay`, then opens a body yielding each chunk after its pause.
    Stream {
        delay: Duration,
        chunks: Vec<(Duration, &'static str)>,
        fail_at_end: bool,
    },
    /// Opens a body that yields one event per tick and never finishes.
    Endless(Duration),
}

impl Script {
    pub fn stream(chunks: &[&'static str]) -> Self {
        Self::Stream {
            delay: Duration::ZERO,
            chunks: chunks.iter().map(|c| (Duration::ZERO, *c)).collect(),
            fail_at_end: false,
        }
    }
}

/// Raises its flag when dropped.
#[derive(Debug)]
pub struct DropFlag(pub Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// `UpstreamPort` test double that counts calls.
#[derive(Debug)]
pub struct ScriptedUpstream {
    script: Script,
    calls: AtomicUsize,
    last_body: Mutex<Option<UpstreamChatBody>>,
    last_cancel: Mutex<Option<CancellationToken>>,
    body_dropped: Arc<AtomicBool>,
}

impl ScriptedUpstream {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            last_body: Mutex::new(None),
            last_cancel: Mutex::new(None),
            body_dropped: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_body(&self) -> Option<UpstreamChatBody> {
        self.last_body.lock().unwrap().clone()
    }

    /// Whether the streaming body handed out has been dropped.
    pub fn body_dropped(&self) -> bool {
        self.body_dropped.load(Ordering::SeqCst)
    }

    /// Whether the last call's cancellation token has fired.
    pub fn call_cancelled(&self) -> bool {
        self.last_cancel
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

#[async_trait]
impl UpstreamPort for ScriptedUpstream {
    async fn send(&self, call: UpstreamCall) -> Result<UpstreamReply, UpstreamFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_body.lock().unwrap() = Some(call.body.clone());
        *self.last_cancel.lock().unwrap() = Some(call.cancel.clone());

        match &self.script {
            Script::Complete(body) => Ok(UpstreamReply::Complete {
                status: 200,
                body: Bytes::from_static(body.as_bytes()),
            }),
            Script::HttpError(status, detail) => Err(UpstreamFailure::Http {
                status: *status,
                detail: (*detail).to_string(),
            }),
            Script::NetworkError => Err(UpstreamFailure::Network(
                "connection refused".to_string(),
            )),
            Script::Hang => std::future::pending().await,
            Script::Stream {
                delay,
                chunks,
                fail_at_end,
            } => {
                tokio::time::sleep(*delay).await;
                let chunks = chunks.clone();
                let fail_at_end = *fail_at_end;
                let flag = DropFlag(Arc::clone(&self.body_dropped));
                let body = stream! {
                    let _flag = flag;
                    for (pause, chunk) in chunks {
                        tokio::time::sleep(pause).await;
                        yield Ok(Bytes::from_static(chunk.as_bytes()));
                    }
                    if fail_at_end {
                        yield Err(UpstreamStreamError("connection reset".to_string()));
                    }
                };
                Ok(UpstreamReply::Streaming(body.boxed()))
            }
            Script::Endless(tick) => {
                let tick = *tick;
                let flag = DropFlag(Arc::clone(&self.body_dropped));
                let body = stream! {
                    let _flag = flag;
                    loop {
                        yield Ok::<_, UpstreamStreamError>(Bytes::from_static(b"data: {\"tick\":true}\n\n"));
                        tokio::time::sleep(tick).await;
                    }
                };
                Ok(UpstreamReply::Streaming(body.boxed()))
            }
        }
    }
}

/// Server-profile settings with short timers.
pub fn fast_settings() -> RelaySettings {
    let mut settings = RelaySettings::for_profile(DeploymentProfile::Server)
        .with_api_key(ApiKey::new("test-key"));
    settings.request_deadline = Duration::from_secs(1);
    settings.stream_deadline = Duration::from_secs(1);
    settings.heartbeat_interval = Duration::from_millis(50);
    settings.stream_idle_timeout = None;
    settings.session_budget = None;
    settings
}

pub fn router(settings: RelaySettings, upstream: Arc<ScriptedUpstream>) -> Router {
    router_with_shutdown(settings, upstream, &CancellationToken::new())
}

pub fn router_with_shutdown(
    settings: RelaySettings,
    upstream: Arc<ScriptedUpstream>,
    shutdown: &CancellationToken,
) -> Router {
    create_router(build_state(
        settings,
        upstream,
        TextExtractionService::new(),
        shutdown,
    ))
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub const HELLO: &str = r#"{"messages":[{"role":"user","content":"hello"}]}"#;
pub const HELLO_STREAM: &str = r#"{"messages":[{"role":"user","content":"hello"}],"stream":true}"#;

/// Drain a response body, failing the test if it does not finish in time.
pub async fn drain(response: Response<Body>) -> Bytes {
    tokio::time::timeout(Duration::from_secs(5), response.into_body().collect())
        .await
        .expect("body did not complete")
        .unwrap()
        .to_bytes()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&drain(response).await).unwrap()
}

/// Split an event-stream body into frames without their trailing blank line.
pub fn frames(body: &[u8]) -> Vec<String> {
    std::str::from_utf8(body)
        .unwrap()
        .split("\n\n")
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

pub const PING: &str = r#"data: {"ping":true}"#;
pub const DONE: &str = "data: [DONE]";

/// Parse the JSON payload of a synthetic `data:` frame.
pub fn payload(frame: &str) -> serde_json::Value {
    serde_json::from_str(frame.strip_prefix("data: ").unwrap()).unwrap()
}

/// Assert the stream ended with exactly one `[DONE]`, as the last frame.
pub fn assert_single_done_last(frames: &[String]) {
    assert_eq!(frames.last().map(String::as_str), Some(DONE), "{frames:?}");
    assert_eq!(frames.iter().filter(|f| *f == DONE).count(), 1, "{frames:?}");
}
