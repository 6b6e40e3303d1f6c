//! Ollama response -> OpenAI response translation.

use chrono::Utc;

use crate::ids;
use crate::ollama::{OllamaChatResponse, OllamaEmbedResponse, OllamaGenerateResponse};
use crate::openai::{
    ChatChoice, ChatCompletionResponse, EmbeddingData, EmbeddingsResponse, ResponseMessage,
    ResponseToolCall, ResponseToolCallFunction, TextChoice, TextCompletionResponse, Usage,
};
use crate::tokens::estimate_tokens;

/// `done_reason` as reported by Ollama, mapped to OpenAI's `finish_reason`
/// vocabulary. Presence of tool calls always wins: a model that emits a
/// tool call is never "stopped".
fn finish_reason(done_reason: Option<&str>, has_tool_calls: bool) -> String {
    if has_tool_calls {
        return "tool_calls".to_string();
    }
    match done_reason {
        Some("length") => "length".to_string(),
        _ => "stop".to_string(),
    }
}

/// `"fp_ollama_" + sanitized_model`, where sanitization strips any
/// character outside `[a-z0-9]` (case folded first).
fn system_fingerprint(model: &str) -> String {
    let sanitized: String = model
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();
    format!("fp_ollama_{sanitized}")
}

/// Real token counts when upstream reports them, otherwise an estimate
/// derived from the prompt/completion text actually exchanged.
fn resolve_usage(
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
    prompt_text: &str,
    completion_text: &str,
) -> Usage {
    let prompt_tokens = prompt_eval_count.unwrap_or_else(|| estimate_tokens(prompt_text));
    let completion_tokens = eval_count.unwrap_or_else(|| estimate_tokens(completion_text));
    Usage {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens,
    }
}

/// Translate a non-streaming (or final-chunk) Ollama chat response into an
/// OpenAI chat completion. `model` is the name echoed back to the client
/// (the one it asked for, not necessarily the backend's internal name).
/// `prompt_text` is the flattened request text, used only as a token-count
/// fallback when Ollama omits `prompt_eval_count`.
#[must_use]
pub fn chat_from_ollama(
    resp: &OllamaChatResponse,
    model: &str,
    prompt_text: &str,
) -> ChatCompletionResponse {
    let message = resp.message.clone().unwrap_or_default();

    let tool_calls = message.tool_calls.as_ref().filter(|c| !c.is_empty()).map(|calls| {
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
            .collect::<Vec<_>>()
    });
    let has_tool_calls = tool_calls.as_ref().is_some_and(|c| !c.is_empty());

    let content = if has_tool_calls && message.content.is_empty() {
        None
    } else {
        Some(message.content.clone())
    };

    let usage = resolve_usage(
        resp.prompt_eval_count,
        resp.eval_count,
        prompt_text,
        &message.content,
    );

    ChatCompletionResponse {
        id: ids::chat_completion_id(),
        object: "chat.completion".to_string(),
        created: Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![ChatChoice {
            index: 0,
            message: ResponseMessage {
                role: "assistant".to_string(),
                content,
                tool_calls,
                reasoning_content: message.thinking.filter(|t| !t.is_empty()),
            },
            finish_reason: finish_reason(resp.done_reason.as_deref(), has_tool_calls),
        }],
        usage,
        system_fingerprint: system_fingerprint(model),
    }
}

/// Translate an Ollama `/api/generate` response into a legacy OpenAI text
/// completion.
#[must_use]
pub fn completion_from_ollama(
    resp: &OllamaGenerateResponse,
    model: &str,
    prompt_text: &str,
) -> TextCompletionResponse {
    let usage = resolve_usage(
        resp.prompt_eval_count,
        resp.eval_count,
        prompt_text,
        &resp.response,
    );

    TextCompletionResponse {
        id: ids::completion_id(),
        object: "text_completion".to_string(),
        created: Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![TextChoice {
            index: 0,
            text: resp.response.clone(),
            finish_reason: Some(finish_reason(resp.done_reason.as_deref(), false)),
        }],
        usage: Some(usage),
    }
}

/// Translate an Ollama `/api/embed` response into OpenAI's embeddings
/// shape. Ollama responds with either a batched `embeddings` field or (on
/// older servers) a single `embedding` vector; either is accepted. If
/// neither is present, `data` comes back empty rather than erroring — the
/// caller still gets a well-formed envelope to return upstream.
#[must_use]
pub fn embeddings_from_ollama(
    resp: &OllamaEmbedResponse,
    model: &str,
    inputs: &[String],
) -> EmbeddingsResponse {
    let vectors: Vec<Vec<f64>> = if let Some(batched) = &resp.embeddings {
        batched.clone()
    } else if let Some(single) = &resp.embedding {
        vec![single.clone()]
    } else {
        Vec::new()
    };

    let data = vectors
        .into_iter()
        .enumerate()
        .map(|(index, embedding)| EmbeddingData {
            object: "embedding".to_string(),
            index,
            embedding,
        })
        .collect();

    let prompt_tokens: u32 = inputs.iter().map(|s| estimate_tokens(s)).sum();

    EmbeddingsResponse {
        object: "list".to_string(),
        data,
        model: model.to_string(),
        usage: Usage {
            prompt_tokens,
            completion_tokens: 0,
            total_tokens: prompt_tokens,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ollama::{OllamaResponseMessage, OllamaToolCall, OllamaToolCallFunction};

    #[test]
    fn plain_text_response_finishes_with_stop() {
        let resp = OllamaChatResponse {
            model: Some("llama3".into()),
            message: Some(OllamaResponseMessage {
                role: "assistant".into(),
                content: "hi there".into(),
                thinking: None,
                tool_calls: None,
            }),
            done: true,
            done_reason: Some("stop".into()),
            prompt_eval_count: Some(5),
            eval_count: Some(3),
        };
        let out = chat_from_ollama(&resp, "gpt-4o", "hello");
        assert_eq!(out.choices[0].finish_reason, "stop");
        assert_eq!(out.choices[0].message.content.as_deref(), Some("hi there"));
        assert_eq!(out.usage.prompt_tokens, 5);
        assert_eq!(out.usage.completion_tokens, 3);
        assert_eq!(out.model, "gpt-4o");
        assert_eq!(out.system_fingerprint, "fp_ollama_gpt4o");
    }

    #[test]
    fn tool_call_response_finishes_with_tool_calls_and_null_content() {
        let resp = OllamaChatResponse {
            model: Some("llama3".into()),
            message: Some(OllamaResponseMessage {
                role: "assistant".into(),
                content: String::new(),
                thinking: None,
                tool_calls: Some(vec![OllamaToolCall {
                    function: OllamaToolCallFunction {
                        name: "get_weather".into(),
                        arguments: serde_json::json!({"city": "Tokyo"}),
                    },
                }]),
            }),
            done: true,
            done_reason: Some("stop".into()),
            prompt_eval_count: None,
            eval_count: None,
        };
        let out = chat_from_ollama(&resp, "gpt-4o", "what's the weather");
        assert_eq!(out.choices[0].finish_reason, "tool_calls");
        assert!(out.choices[0].message.content.is_none());
        let calls = out.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "get_weather");
        assert_eq!(calls[0].function.arguments, "{\"city\":\"Tokyo\"}");
    }

    #[test]
    fn missing_counts_fall_back_to_estimate() {
        let resp = OllamaChatResponse {
            model: Some("llama3".into()),
            message: Some(OllamaResponseMessage {
                role: "assistant".into(),
                content: "abcdefgh".into(),
                thinking: None,
                tool_calls: None,
            }),
            done: true,
            done_reason: None,
            prompt_eval_count: None,
            eval_count: None,
        };
        let out = chat_from_ollama(&resp, "gpt-4o", "abcdefgh");
        assert_eq!(out.usage.prompt_tokens, 2);
        assert_eq!(out.usage.completion_tokens, 2);
    }

    #[test]
    fn embeddings_batched_field_preferred() {
        let resp = OllamaEmbedResponse {
            embeddings: Some(vec![vec![0.1, 0.2], vec![0.3, 0.4]]),
            embedding: None,
        };
        let out = embeddings_from_ollama(&resp, "text-embed", &["a".into(), "b".into()]);
        assert_eq!(out.data.len(), 2);
        assert_eq!(out.data[1].index, 1);
    }

    #[test]
    fn embeddings_missing_fields_yield_empty_data() {
        let resp = OllamaEmbedResponse {
            embeddings: None,
            embedding: None,
        };
        let out = embeddings_from_ollama(&resp, "text-embed", &["a".into()]);
        assert!(out.data.is_empty());
        assert_eq!(out.usage.prompt_tokens, 1);
    }

    #[test]
    fn single_embedding_field_wrapped() {
        let resp = OllamaEmbedResponse {
            embeddings: None,
            embedding: Some(vec![1.0, 2.0]),
        };
        let out = embeddings_from_ollama(&resp, "text-embed", &["a".into()]);
        assert_eq!(out.data.len(), 1);
        assert_eq!(out.data[0].embedding, vec![1.0, 2.0]);
    }
}
