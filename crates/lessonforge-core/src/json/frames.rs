//! Streaming transport frames (server-sent events).
//!
//! OpenAI-compatible streaming endpoints send one `data: {json}` line per
//! fragment and finish with `data: [DONE]`. Some callers capture the raw
//! stream verbatim and hand it to the extractor, so both the HTTP client
//! and the extractor reassemble content from these frames.

use serde_json::Value;

/// Prefix of every event-stream data line.
const DATA_PREFIX: &str = "data:";

/// Terminal sentinel payload.
pub const DONE_SENTINEL: &str = "[DONE]";

/// What a single `data:` payload carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A content fragment to append.
    Content(String),
    /// The terminal sentinel.
    Done,
    /// A well-formed frame with no content (role header, usage, keep-alive).
    Empty,
}

/// Parse the payload of one `data:` line (without the prefix).
///
/// Unparseable payloads are reported as [`Frame::Empty`]; a broken frame
/// must not abort reassembly of the rest of the stream.
pub fn parse_frame(payload: &str) -> Frame {
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return Frame::Done;
    }
    let Ok(v) = serde_json::from_str::<Value>(payload) else {
        return Frame::Empty;
    };
    match frame_text(&v) {
        Some(text) if !text.is_empty() => Frame::Content(text.to_string()),
        _ => Frame::Empty,
    }
}

/// Locate the text fragment in a decoded frame.
///
/// Checks the OpenAI delta shape first, then a full message (some servers
/// send one non-delta frame), then flat `content`/`response`/`text` keys.
fn frame_text(v: &Value) -> Option<&str> {
    if let Some(choice) = v.get("choices").and_then(|c| c.get(0)) {
        return choice
            .get("delta")
            .and_then(|d| d.get("content"))
            .or_else(|| choice.get("message").and_then(|m| m.get("content")))
            .or_else(|| choice.get("text"))
            .and_then(Value::as_str);
    }
    v.get("content")
        .or_else(|| v.get("response"))
        .or_else(|| v.get("text"))
        .and_then(Value::as_str)
}

/// Strip the `data:` prefix from a line, if present.
pub fn data_payload(line: &str) -> Option<&str> {
    line.trim_start().strip_prefix(DATA_PREFIX)
}

/// True when `raw` looks like a captured event stream.
pub fn has_frames(raw: &str) -> bool {
    raw.lines().any(|line| data_payload(line).is_some())
}

/// Reassemble the content fragments of a captured event stream, in order.
///
/// Returns `None` when `raw` holds no `data:` lines or no frame carried
/// content, so the caller can fall back to treating `raw` as plain text.
pub fn reassemble_frames(raw: &str) -> Option<String> {
    if !has_frames(raw) {
        return None;
    }

    let mut content = String::new();
    for line in raw.lines() {
        let Some(payload) = data_payload(line) else {
            continue;
        };
        match parse_frame(payload) {
            Frame::Content(text) => content.push_str(&text),
            Frame::Done => break,
            Frame::Empty => {}
        }
    }

    if content.is_empty() { None } else { Some(content) }
}

/// Splits a byte stream into complete lines.
///
/// Lines are decoded only once their newline has arrived, so a multi-byte
/// character split across network chunks is reassembled before decoding.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, without the
    /// trailing newline.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(end) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            lines.push(decode_line(&line[..end]));
        }
        lines
    }

    /// The unterminated tail left when the stream ended, if any.
    pub fn finish(self) -> Option<String> {
        if self.pending.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(decode_line(&self.pending))
        }
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
