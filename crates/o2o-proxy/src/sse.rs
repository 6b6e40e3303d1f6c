//! SSE relay: Ollama's NDJSON stream, byte-decoded incrementally and
//! translated line-by-line into OpenAI SSE frames.

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use o2o_registry::Selection;
use o2o_translator::ollama::{OllamaChatResponse, OllamaGenerateResponse};
use o2o_translator::stream::{ChatStreamState, StreamKind};
use tracing::debug;

use crate::retry;
use crate::state::AppState;

const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Translate an upstream Ollama NDJSON `/api/chat` (or `/api/generate`)
/// stream into an OpenAI-compatible `text/event-stream` response.
pub fn relay(
    state: AppState,
    selection: Selection,
    token_id: Option<String>,
    kind: StreamKind,
    model: String,
    upstream: reqwest::Response,
) -> Response {
    let byte_stream = upstream.bytes_stream();
    let relay_state = RelayState {
        stream: byte_stream.boxed(),
        buf: BytesMut::new(),
        translator: ChatStreamState::new(kind, &model),
        state,
        selection,
        token_id,
        usage: None,
        finished: false,
    };

    let body_stream = futures_util::stream::unfold(relay_state, step);

    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/event-stream")
        .header("cache-control", "no-cache")
        .header("connection", "keep-alive")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(body_stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

struct RelayState {
    stream: futures_util::stream::BoxStream<'static, Result<Bytes, reqwest::Error>>,
    buf: BytesMut,
    translator: ChatStreamState,
    state: AppState,
    selection: Selection,
    token_id: Option<String>,
    usage: Option<(u64, u64)>,
    finished: bool,
}

impl Drop for RelayState {
    /// The channel slot is released exactly once here regardless of why
    /// the generator stopped: normal finish, an in-band error frame, or
    /// the client disconnecting and axum dropping the stream mid-poll.
    fn drop(&mut self) {
        retry::release_slot(&self.state, &self.selection);
    }
}

async fn step(mut st: RelayState) -> Option<(Result<Bytes, std::io::Error>, RelayState)> {
    if st.finished {
        return None;
    }

    loop {
        if let Some(line_end) = find_newline(&st.buf) {
            let line = st.buf.split_to(line_end);
            let trimmed = String::from_utf8_lossy(&line).trim().to_string();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(frame) = translate_line(&mut st, &trimmed) {
                return Some((Ok(frame), st));
            }
            continue;
        }

        match st.stream.next().await {
            Some(Ok(chunk)) => st.buf.extend_from_slice(&chunk),
            Some(Err(err)) => return Some((Ok(finish_with_error(&mut st, &err.to_string())), st)),
            None => {
                let trailing = st.buf.split_to(st.buf.len());
                let mut out = String::new();
                if !trailing.is_empty() {
                    let line = String::from_utf8_lossy(&trailing).trim().to_string();
                    if !line.is_empty() {
                        if let Some(frame) = translate_line(&mut st, &line) {
                            out.push_str(&String::from_utf8_lossy(&frame));
                        }
                    }
                }
                out.push_str(&finish_success(&mut st));
                return Some((Ok(Bytes::from(out)), st));
            }
        }
    }
}

/// Parse and translate one NDJSON line, returning the SSE frame to write.
/// A malformed line is skipped (no frame, no stream abort) per spec.
fn translate_line(st: &mut RelayState, line: &str) -> Option<Bytes> {
    match st.translator.kind() {
        StreamKind::Chat => {
            let Ok(upstream) = serde_json::from_str::<OllamaChatResponse>(line) else {
                debug!(line, "skipping malformed chat stream line");
                return None;
            };
            if upstream.done {
                st.usage = Some((
                    u64::from(upstream.prompt_eval_count.unwrap_or(0)),
                    u64::from(upstream.eval_count.unwrap_or(0)),
                ));
            }
            let chunk = st.translator.next_chat_chunk(&upstream);
            if let Some(usage) = &chunk.choices[0].usage {
                st.usage = Some((u64::from(usage.prompt_tokens), u64::from(usage.completion_tokens)));
            }
            serde_json::to_string(&chunk).ok().map(frame)
        }
        StreamKind::Completion => {
            let Ok(upstream) = serde_json::from_str::<OllamaGenerateResponse>(line) else {
                debug!(line, "skipping malformed completion stream line");
                return None;
            };
            let chunk = st.translator.next_completion_chunk(&upstream);
            if let Some(usage) = &chunk.usage {
                st.usage = Some((u64::from(usage.prompt_tokens), u64::from(usage.completion_tokens)));
            }
            serde_json::to_string(&chunk).ok().map(frame)
        }
    }
}

fn frame(json: String) -> Bytes {
    Bytes::from(format!("data: {json}\n\n"))
}

/// Relay reached EOF without a transport error: bookkeeping runs, then
/// the `[DONE]` sentinel is appended.
fn finish_success(st: &mut RelayState) -> String {
    st.finished = true;
    let (prompt, completion) = st.usage.unwrap_or((0, 0));
    retry::record_success(&st.state, &st.selection);
    if let Some(token_id) = &st.token_id {
        st.state.tokens.record_usage(token_id, prompt, completion);
    }
    DONE_FRAME.to_string()
}

/// Relay hit a transport/read error mid-stream: emit one error frame plus
/// the sentinel, record the failure, and stop — no retry is possible
/// because the response is already committed.
fn finish_with_error(st: &mut RelayState, message: &str) -> Bytes {
    st.finished = true;
    st.state.credentials.record_failure(&st.selection.credential.id, message);
    st.state.stats.record_failure(&st.selection.credential.id);
    if let Some(channel_id) = &st.selection.channel_id {
        st.state.channels.record_failure(channel_id);
    }
    let error_json = serde_json::json!({"error": {"message": message, "type": "stream_error"}}).to_string();
    Bytes::from(format!("data: {error_json}\n\n{DONE_FRAME}"))
}

fn find_newline(buf: &BytesMut) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n').map(|pos| pos + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_newline_returns_index_past_the_line_feed() {
        let buf = BytesMut::from(&b"{\"done\":false}\nrest"[..]);
        assert_eq!(find_newline(&buf), Some(15));
    }

    #[test]
    fn find_newline_is_none_without_a_line_feed_yet() {
        let buf = BytesMut::from(&b"{\"done\":false"[..]);
        assert_eq!(find_newline(&buf), None);
    }

    #[test]
    fn find_newline_finds_the_first_of_several_lines() {
        let buf = BytesMut::from(&b"one\ntwo\nthree"[..]);
        assert_eq!(find_newline(&buf), Some(4));
    }
}
