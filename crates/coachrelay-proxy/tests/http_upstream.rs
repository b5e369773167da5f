//! `HttpUpstream` against a local mock of the chat-completion API, plus
//! end-to-end passes through `serve`.

mod common;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_stream::stream;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use coachrelay_core::{
    ApiKey, ChatMessage, TextExtractionService, UpstreamCall, UpstreamChatBody, UpstreamFailure,
    UpstreamPort, UpstreamReply,
};
use coachrelay_proxy::{HttpUpstream, build_state, serve};
use common::{DONE, PING, DropFlag, fast_settings, frames};

const SSE_BODY: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: [DONE]\n\n";

async fn completions(headers: HeaderMap, body: Bytes) -> Response {
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer test-key") {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    let request: serde_json::Value = serde_json::from_slice(&body).unwrap_or_default();
    if request["stream"] == true {
        return Response::builder()
            .header("content-type", "text/event-stream")
            .body(Body::from(SSE_BODY))
            .unwrap_or_default();
    }
    axum::Json(serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": request["messages"][0]["content"]}}]
    }))
    .into_response()
}

async fn overloaded() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "try later").into_response()
}

/// Ignores `stream: true` and answers with a plain JSON document.
async fn json_only() -> Response {
    axum::Json(serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": "whole"}}]
    }))
    .into_response()
}

async fn slow() -> Response {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "late".into_response()
}

async fn spawn_mock() -> SocketAddr {
    let app = Router::new()
        .route("/chat/completions", post(completions))
        .route("/overloaded", post(overloaded))
        .route("/json-only", post(json_only))
        .route("/slow", post(slow));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Mock whose event stream never ends. The flag is raised once the server
/// drops the body.
async fn spawn_endless() -> (SocketAddr, Arc<AtomicBool>) {
    let dropped = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&dropped);
    let app = Router::new().route(
        "/chat/completions",
        post(move || {
            let flag = Arc::clone(&flag);
            async move {
                let body = stream! {
                    let _guard = DropFlag(flag);
                    loop {
                        yield Ok::<_, Infallible>(Bytes::from_static(b"data: {\"tick\":true}\n\n"));
                        tokio::time::sleep(Duration::from_millis(20)).await;
                    }
                };
                Response::builder()
                    .header("content-type", "text/event-stream")
                    .body(Body::from_stream(body))
                    .unwrap_or_default()
            }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, dropped)
}

fn call(key: &str, stream: bool, deadline: Duration) -> UpstreamCall {
    UpstreamCall::new(
        ApiKey::new(key).unwrap(),
        UpstreamChatBody {
            model: "deepseek-chat".to_string(),
            messages: vec![ChatMessage::user("echo me")],
            temperature: 0.7,
            stream,
        },
        deadline,
    )
}

#[tokio::test]
async fn complete_reply_is_buffered_with_bearer_auth() {
    let addr = spawn_mock().await;
    let upstream = HttpUpstream::new(format!("http://{addr}/chat/completions")).unwrap();

    let reply = upstream
        .send(call("test-key", false, Duration::from_secs(2)))
        .await
        .unwrap();

    let UpstreamReply::Complete { status, body } = reply else {
        panic!("expected a buffered reply, got {reply:?}");
    };
    assert_eq!(status, 200);
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["choices"][0]["message"]["content"], "echo me");
}

#[tokio::test]
async fn streaming_reply_yields_raw_bytes() {
    let addr = spawn_mock().await;
    let upstream = HttpUpstream::new(format!("http://{addr}/chat/completions")).unwrap();

    let reply = upstream
        .send(call("test-key", true, Duration::from_secs(2)))
        .await
        .unwrap();

    let UpstreamReply::Streaming(mut stream) = reply else {
        panic!("expected a streaming reply, got {reply:?}");
    };
    let mut received = Vec::new();
    while let Some(chunk) = stream.next().await {
        received.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(received, SSE_BODY.as_bytes());
}

#[tokio::test]
async fn json_answer_to_stream_request_is_buffered() {
    let addr = spawn_mock().await;
    let upstream = HttpUpstream::new(format!("http://{addr}/json-only")).unwrap();

    let reply = upstream
        .send(call("test-key", true, Duration::from_secs(2)))
        .await
        .unwrap();

    let UpstreamReply::Complete { status, body } = reply else {
        panic!("expected a buffered reply, got {reply:?}");
    };
    assert_eq!(status, 200);
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["choices"][0]["message"]["content"], "whole");
}

#[tokio::test]
async fn cancelled_call_ends_the_body_stream() {
    let (addr, server_body_dropped) = spawn_endless().await;
    let upstream = HttpUpstream::new(format!("http://{addr}/chat/completions")).unwrap();
    let cancel = CancellationToken::new();

    let reply = upstream
        .send(call("test-key", true, Duration::from_secs(2)).with_cancel(cancel.clone()))
        .await
        .unwrap();
    let UpstreamReply::Streaming(mut stream) = reply else {
        panic!("expected a streaming reply, got {reply:?}");
    };
    assert!(stream.next().await.unwrap().is_ok());

    cancel.cancel();
    let next = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("stream kept running after cancel");
    assert!(next.is_none());

    // Releasing the response closes the connection, so the server gives up
    // on the body as well.
    drop(stream);
    tokio::time::timeout(Duration::from_secs(2), async {
        while !server_body_dropped.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("server kept writing to a closed connection");
}

#[tokio::test]
async fn error_status_carries_status_and_body() {
    let addr = spawn_mock().await;

    let upstream = HttpUpstream::new(format!("http://{addr}/overloaded")).unwrap();
    let failure = upstream
        .send(call("test-key", false, Duration::from_secs(2)))
        .await
        .unwrap_err();
    assert_eq!(
        failure,
        UpstreamFailure::Http {
            status: 503,
            detail: "try later".to_string()
        }
    );

    let upstream = HttpUpstream::new(format!("http://{addr}/chat/completions")).unwrap();
    let failure = upstream
        .send(call("wrong-key", false, Duration::from_secs(2)))
        .await
        .unwrap_err();
    assert!(matches!(failure, UpstreamFailure::Http { status: 401, .. }));
}

#[tokio::test]
async fn slow_upstream_hits_the_deadline() {
    let addr = spawn_mock().await;
    let upstream = HttpUpstream::new(format!("http://{addr}/slow")).unwrap();

    let deadline = Duration::from_millis(300);
    let failure = upstream
        .send(call("test-key", false, deadline))
        .await
        .unwrap_err();

    assert_eq!(failure, UpstreamFailure::Timeout(deadline));
}

#[tokio::test]
async fn unreachable_upstream_is_a_network_failure() {
    // Bind then drop to get a port nothing listens on.
    let addr = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();
    let upstream = HttpUpstream::new(format!("http://{addr}/chat/completions")).unwrap();

    let failure = upstream
        .send(call("test-key", false, Duration::from_secs(2)))
        .await
        .unwrap_err();

    assert!(matches!(failure, UpstreamFailure::Network(_)), "{failure:?}");
}

#[tokio::test]
async fn serve_relays_a_stream_end_to_end() {
    let mock = spawn_mock().await;
    let upstream = HttpUpstream::new(format!("http://{mock}/chat/completions")).unwrap();
    let settings = fast_settings().with_upstream_url(upstream.url());

    let shutdown = CancellationToken::new();
    let state = build_state(
        settings,
        Arc::new(upstream),
        TextExtractionService::new(),
        &shutdown,
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay = listener.local_addr().unwrap();
    let server = tokio::spawn(serve(listener, state, shutdown.clone()));

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{relay}/api/deepseek/chat"))
        .json(&serde_json::json!({
            "messages": [{"role": "user", "content": "hello"}],
            "stream": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    let body = response.bytes().await.unwrap();

    let frames = frames(&body);
    assert_eq!(frames.first().map(String::as_str), Some(PING));
    assert_eq!(
        frames.iter().filter(|f| *f != PING).map(String::as_str).collect::<Vec<_>>(),
        ["data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}", DONE]
    );

    let health = client
        .get(format!("http://{relay}/api/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), 200);
    drop(client);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn json_answer_relays_as_one_data_event() {
    let mock = spawn_mock().await;
    let upstream = HttpUpstream::new(format!("http://{mock}/json-only")).unwrap();
    let settings = fast_settings().with_upstream_url(upstream.url());

    let shutdown = CancellationToken::new();
    let state = build_state(
        settings,
        Arc::new(upstream),
        TextExtractionService::new(),
        &shutdown,
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay = listener.local_addr().unwrap();
    let server = tokio::spawn(serve(listener, state, shutdown.clone()));

    let client = reqwest::Client::new();
    let body = client
        .post(format!("http://{relay}/api/deepseek/chat"))
        .json(&serde_json::json!({
            "messages": [{"role": "user", "content": "hello"}],
            "stream": true
        }))
        .send()
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();

    let frames = frames(&body);
    for frame in &frames {
        assert!(frame.starts_with("data: "), "{frame:?}");
    }
    assert_eq!(
        frames.iter().filter(|f| *f != PING).map(String::as_str).collect::<Vec<_>>(),
        [
            r#"data: {"choices":[{"message":{"content":"whole","role":"assistant"}}]}"#,
            DONE
        ]
    );
    drop(client);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
