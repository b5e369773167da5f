//! reqwest-backed implementation of the upstream chat-completion port.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::{debug, warn};

use coachrelay_core::{
    UpstreamCall, UpstreamFailure, UpstreamPort, UpstreamReply, UpstreamStreamError,
};

/// Bound on establishing the TCP/TLS connection to upstream.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Chat-completion client for one endpoint.
///
/// The connection pool is shared by every relay session; no per-session
/// state lives here.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
    url: String,
}

impl HttpUpstream {
    /// Build a client with pooled connections.
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn exchange(&self, call: UpstreamCall) -> Result<UpstreamReply, UpstreamFailure> {
        let streaming = call.is_streaming();
        debug!(url = %self.url, streaming, model = %call.body.model, "Sending upstream request");

        let mut request = self
            .client
            .post(&self.url)
            .bearer_auth(call.api_key.expose())
            .json(&call.body);
        if streaming {
            request = request.header(ACCEPT, "text/event-stream");
        }

        let response = request.send().await.map_err(classify_error)?;
        let status = response.status();

        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Upstream returned an error status");
            return Err(UpstreamFailure::Http {
                status: status.as_u16(),
                detail,
            });
        }

        if streaming && is_event_stream(response.headers()) {
            let stream = response
                .bytes_stream()
                .map_err(|e| UpstreamStreamError(e.to_string()))
                .take_until(call.cancel.cancelled_owned())
                .boxed();
            return Ok(UpstreamReply::Streaming(stream));
        }

        if streaming {
            debug!("Upstream answered a stream request without an event stream, buffering");
        }
        let body = response.bytes().await.map_err(classify_error)?;
        Ok(UpstreamReply::Complete {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl UpstreamPort for HttpUpstream {
    async fn send(&self, call: UpstreamCall) -> Result<UpstreamReply, UpstreamFailure> {
        let deadline = call.deadline;
        // Dropping the in-flight future on expiry aborts the request.
        match tokio::time::timeout(deadline, self.exchange(call)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(?deadline, "Upstream request timed out");
                Err(UpstreamFailure::Timeout(deadline))
            }
        }
    }
}

/// Whether the response is an event stream. A missing content type is taken
/// at its word, since the stream was asked for.
fn is_event_stream(headers: &reqwest::header::HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_none_or(|ct| ct.trim_start().starts_with("text/event-stream"))
}

/// Map a transport error to a network failure with a readable detail.
fn classify_error(error: reqwest::Error) -> UpstreamFailure {
    let kind = if error.is_timeout() {
        "connection timed out"
    } else if error.is_connect() {
        "connection failed"
    } else if error.is_decode() || error.is_body() {
        "response body interrupted"
    } else {
        "request failed"
    };
    UpstreamFailure::Network(format!("{kind}: {error}"))
}
