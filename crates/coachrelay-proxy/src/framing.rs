//! Event-stream framing for relay sessions.
//!
//! Upstream bytes are already framed as `data:` events; they are forwarded
//! untouched but only in whole events, so synthetic frames (heartbeats,
//! errors, `[DONE]`) always land on an event boundary.

use bytes::{Bytes, BytesMut};
use serde_json::{Value, json};

use coachrelay_core::{HeartbeatStyle, RelayError};

/// End-of-stream sentinel payload.
pub const DONE_MARKER: &str = "[DONE]";

/// Most bytes an unterminated upstream event may hold back.
pub const MAX_PENDING_EVENT: usize = 1024 * 1024;

/// `data: <payload>\n\n`, prefixing every line of a multi-line payload.
#[must_use]
pub fn data_frame(payload: &str) -> Bytes {
    let mut frame = String::with_capacity(payload.len() + 8);
    for line in payload.lines() {
        frame.push_str("data: ");
        frame.push_str(line);
        frame.push('\n');
    }
    if payload.is_empty() {
        frame.push_str("data: \n");
    }
    frame.push('\n');
    Bytes::from(frame)
}

#[must_use]
pub fn json_frame(value: &Value) -> Bytes {
    data_frame(&value.to_string())
}

/// SSE comment line, ignored by every conforming parser.
#[must_use]
pub fn comment_frame(text: &str) -> Bytes {
    Bytes::from(format!(": {text}\n\n"))
}

/// JSON payload describing a failed session.
#[must_use]
pub fn error_payload(err: &RelayError) -> Value {
    let mut payload = json!({
        "error": err.reason(),
        "detail": err.detail(),
    });
    if let Some(status) = err.upstream_status() {
        payload["status"] = json!(status);
    }
    payload
}

/// Whether a complete event carries the `[DONE]` sentinel.
#[must_use]
pub fn is_done_event(event: &[u8]) -> bool {
    event
        .split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter_map(|line| line.strip_prefix(b"data:"))
        .any(|data| data.trim_ascii() == DONE_MARKER.as_bytes())
}

/// Produces the synthetic frames of one session.
///
/// Tracks whether `[DONE]` has gone out so it is written exactly once.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    style: HeartbeatStyle,
    done_sent: bool,
}

impl FrameEncoder {
    #[must_use]
    pub const fn new(style: HeartbeatStyle) -> Self {
        Self {
            style,
            done_sent: false,
        }
    }

    #[must_use]
    pub fn heartbeat(&self) -> Bytes {
        match self.style {
            HeartbeatStyle::DataPing => Bytes::from_static(b"data: {\"ping\":true}\n\n"),
            HeartbeatStyle::Comment => comment_frame("ping"),
        }
    }

    #[must_use]
    pub fn error(&self, err: &RelayError) -> Bytes {
        json_frame(&error_payload(err))
    }

    /// The `[DONE]` frame, or `None` once it has been produced.
    pub fn done(&mut self) -> Option<Bytes> {
        if self.done_sent {
            return None;
        }
        self.done_sent = true;
        Some(data_frame(DONE_MARKER))
    }

    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done_sent
    }
}

/// Result of feeding one upstream chunk to an [`EventSplitter`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Forwardable {
    /// Complete events ready to write, in order.
    pub bytes: Option<Bytes>,
    /// Upstream sent its own `[DONE]`; nothing after it is forwarded.
    pub saw_done: bool,
    /// The unterminated remainder passed the limit and was discarded.
    pub too_large: bool,
}

/// Reassembles arbitrary upstream chunks into whole events.
#[derive(Debug)]
pub struct EventSplitter {
    pending: BytesMut,
    limit: usize,
}

impl Default for EventSplitter {
    fn default() -> Self {
        Self::with_limit(MAX_PENDING_EVENT)
    }
}

impl EventSplitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            pending: BytesMut::new(),
            limit,
        }
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    pub fn push(&mut self, chunk: &[u8]) -> Forwardable {
        self.pending.extend_from_slice(chunk);

        let mut ready = BytesMut::new();
        let mut saw_done = false;
        while let Some(end) = find_event_end(&self.pending) {
            let event = self.pending.split_to(end);
            if is_done_event(&event) {
                saw_done = true;
                self.pending.clear();
                break;
            }
            ready.extend_from_slice(&event);
        }

        let too_large = !saw_done && self.pending.len() > self.limit;
        if too_large {
            self.pending.clear();
        }

        Forwardable {
            bytes: (!ready.is_empty()).then(|| ready.freeze()),
            saw_done,
            too_large,
        }
    }

    /// Flush an unterminated trailing event at upstream EOF.
    ///
    /// The tail is written as received, followed by a blank line so the
    /// next frame starts on its own event.
    pub fn finish(&mut self) -> Option<Bytes> {
        let tail = self.pending.split();
        if tail.trim_ascii().is_empty() || is_done_event(&tail) {
            return None;
        }
        let mut out = BytesMut::from(&tail[..]);
        out.extend_from_slice(if tail.ends_with(b"\n") { &b"\n"[..] } else { &b"\n\n"[..] });
        Some(out.freeze())
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Index just past the first blank-line terminator (`\n\n` or `\n\r\n`).
fn find_event_end(buf: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i < buf.len() {
        if buf[i] == b'\n' {
            match buf.get(i + 1) {
                Some(b'\n') => return Some(i + 2),
                Some(b'\r') if buf.get(i + 2) == Some(&b'\n') => return Some(i + 3),
                _ => {}
            }
        }
        i += 1;
    }
    None
}
