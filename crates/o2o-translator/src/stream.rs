//! Streaming chunk translation.
//!
//! Ollama streams one NDJSON object per chunk; OpenAI streams one `data: `
//! SSE event per chunk carrying a `delta` (chat) or partial `text`
//! (completions). `o2o-proxy` owns the actual SSE framing — this module
//! only carries the per-connection state needed to translate one chunk at
//! a time and produces the JSON body for it.

use chrono::Utc;

use crate::ids;
use crate::ollama::{OllamaChatResponse, OllamaGenerateResponse};
use crate::openai::{
    ChatChunkChoice, ChatCompletionChunk, ChatDelta, ResponseToolCall, ResponseToolCallFunction,
    TextChoice, TextCompletionResponse, Usage,
};

/// Which OpenAI endpoint shape a stream is being translated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Chat,
    Completion,
}

/// `done_reason` as reported by Ollama, mapped to OpenAI's `finish_reason`
/// vocabulary. Kept in sync with the non-streaming mapping in `response.rs`.
fn finish_reason(done_reason: Option<&str>, has_tool_calls: bool) -> String {
    if has_tool_calls {
        return "tool_calls".to_string();
    }
    match done_reason {
        Some("length") => "length".to_string(),
        _ => "stop".to_string(),
    }
}

/// Per-connection state carried across one streamed request's chunks.
pub struct ChatStreamState {
    kind: StreamKind,
    id: String,
    model: String,
    created: i64,
    sent_role: bool,
    /// Number of content-bearing chunks seen so far. Used only as a
    /// completion-token fallback when the final chunk omits `eval_count` —
    /// Ollama streams roughly one token per chunk, so the chunk count is a
    /// closer proxy than re-estimating from accumulated text.
    completion_chunks: u32,
}

impl ChatStreamState {
    #[must_use]
    pub fn new(kind: StreamKind, model: &str) -> Self {
        let id = match kind {
            StreamKind::Chat => ids::chat_completion_id(),
            StreamKind::Completion => ids::completion_id(),
        };
        Self {
            kind,
            id,
            model: model.to_string(),
            created: Utc::now().timestamp(),
            sent_role: false,
            completion_chunks: 0,
        }
    }

    #[must_use]
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Translate one Ollama `/api/chat` streaming chunk. Call `new` with
    /// `StreamKind::Chat`.
    pub fn next_chat_chunk(&mut self, upstream: &OllamaChatResponse) -> ChatCompletionChunk {
        let message = upstream.message.clone().unwrap_or_default();

        let mut delta = ChatDelta::default();
        if !self.sent_role {
            delta.role = Some("assistant".to_string());
            self.sent_role = true;
        }
        if !message.content.is_empty() {
            delta.content = Some(message.content.clone());
            self.completion_chunks += 1;
        }
        if let Some(t) = message.thinking.filter(|t| !t.is_empty()) {
            delta.reasoning_content = Some(t);
        }

        let has_tool_calls = message.tool_calls.as_ref().is_some_and(|c| !c.is_empty());
        if let Some(calls) = message.tool_calls.filter(|c| !c.is_empty()) {
            delta.tool_calls = Some(
                calls
                    .iter()
                    .enumerate()
                    .map(|(index, c)| ResponseToolCall {
                        id: ids::tool_call_id(),
                        index: index as u32,
                        kind: "function".to_string(),
                        function: ResponseToolCallFunction {
                            name: c.function.name.clone(),
                            arguments: serde_json::to_string(&c.function.arguments)
                                .unwrap_or_else(|_| "{}".to_string()),
                        },
                    })
                    .collect(),
            );
        }

        let (finish_reason, usage) = if upstream.done {
            let prompt_tokens = upstream.prompt_eval_count.unwrap_or(0);
            let completion_tokens = upstream.eval_count.unwrap_or(self.completion_chunks);
            (
                Some(finish_reason(upstream.done_reason.as_deref(), has_tool_calls)),
                Some(Usage {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens: prompt_tokens + completion_tokens,
                }),
            )
        } else {
            (None, None)
        };

        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChatChunkChoice {
                index: 0,
                delta,
                finish_reason,
                usage,
            }],
        }
    }

    /// Translate one Ollama `/api/generate` streaming chunk. Call `new`
    /// with `StreamKind::Completion`.
    pub fn next_completion_chunk(&mut self, upstream: &OllamaGenerateResponse) -> TextCompletionResponse {
        if !upstream.response.is_empty() {
            self.completion_chunks += 1;
        }

        let (finish_reason, usage) = if upstream.done {
            let prompt_tokens = upstream.prompt_eval_count.unwrap_or(0);
            let completion_tokens = upstream.eval_count.unwrap_or(self.completion_chunks);
            (
                Some(finish_reason(upstream.done_reason.as_deref(), false)),
                Some(Usage {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens: prompt_tokens + completion_tokens,
                }),
            )
        } else {
            (None, None)
        };

        TextCompletionResponse {
            id: self.id.clone(),
            object: "text_completion".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![TextChoice {
                index: 0,
                text: upstream.response.clone(),
                finish_reason,
            }],
            usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ollama::OllamaResponseMessage;

    fn content_chunk(content: &str, done: bool) -> OllamaChatResponse {
        OllamaChatResponse {
            model: Some("llama3".into()),
            message: Some(OllamaResponseMessage {
                role: "assistant".into(),
                content: content.into(),
                thinking: None,
                tool_calls: None,
            }),
            done,
            done_reason: if done { Some("stop".into()) } else { None },
            prompt_eval_count: if done { Some(7) } else { None },
            eval_count: if done { Some(4) } else { None },
        }
    }

    #[test]
    fn first_chunk_carries_role_once() {
        let mut state = ChatStreamState::new(StreamKind::Chat, "gpt-4o");
        let first = state.next_chat_chunk(&content_chunk("Hi", false));
        assert_eq!(first.choices[0].delta.role.as_deref(), Some("assistant"));
        let second = state.next_chat_chunk(&content_chunk(" there", false));
        assert!(second.choices[0].delta.role.is_none());
    }

    #[test]
    fn final_chunk_uses_real_counts_not_chunk_counter() {
        let mut state = ChatStreamState::new(StreamKind::Chat, "gpt-4o");
        state.next_chat_chunk(&content_chunk("a", false));
        state.next_chat_chunk(&content_chunk("b", false));
        let last = state.next_chat_chunk(&content_chunk("", true));
        let usage = last.choices[0].usage.as_ref().unwrap();
        assert_eq!(usage.prompt_tokens, 7);
        assert_eq!(usage.completion_tokens, 4);
    }

    #[test]
    fn final_chunk_without_eval_count_falls_back_to_chunk_counter() {
        let mut state = ChatStreamState::new(StreamKind::Chat, "gpt-4o");
        state.next_chat_chunk(&content_chunk("a", false));
        state.next_chat_chunk(&content_chunk("b", false));
        let mut done = content_chunk("", true);
        done.eval_count = None;
        done.prompt_eval_count = None;
        let last = state.next_chat_chunk(&done);
        let usage = last.choices[0].usage.as_ref().unwrap();
        assert_eq!(usage.prompt_tokens, 0);
        assert_eq!(usage.completion_tokens, 2);
    }

    #[test]
    fn non_final_chunk_has_no_usage_or_finish_reason() {
        let mut state = ChatStreamState::new(StreamKind::Chat, "gpt-4o");
        let chunk = state.next_chat_chunk(&content_chunk("hi", false));
        assert!(chunk.choices[0].usage.is_none());
        assert!(chunk.choices[0].finish_reason.is_none());
    }

    #[test]
    fn completion_stream_tracks_content_chunks() {
        let mut state = ChatStreamState::new(StreamKind::Completion, "gpt-3.5-turbo-instruct");
        state.next_completion_chunk(&OllamaGenerateResponse {
            model: Some("llama3".into()),
            response: "foo".into(),
            done: false,
            done_reason: None,
            prompt_eval_count: None,
            eval_count: None,
        });
        let last = state.next_completion_chunk(&OllamaGenerateResponse {
            model: Some("llama3".into()),
            response: String::new(),
            done: true,
            done_reason: Some("stop".into()),
            prompt_eval_count: None,
            eval_count: None,
        });
        assert_eq!(last.usage.unwrap().completion_tokens, 1);
    }
}
