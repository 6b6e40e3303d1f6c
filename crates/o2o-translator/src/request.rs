//! OpenAI request -> Ollama request translation.

use serde_json::{Map, Value};

use crate::ollama::{
    OllamaChatRequest, OllamaEmbedRequest, OllamaGenerateRequest, OllamaMessage, OllamaTool,
    OllamaToolCall, OllamaToolCallFunction,
};
use crate::openai::{ChatCompletionRequest, CompletionRequest, EmbeddingsRequest};

/// Option names shared between chat and completions, copied only when
/// present in the source and renamed to Ollama's `options` field names.
fn apply_shared_options(options: &mut Map<String, Value>, req_options: &[(&str, Option<Value>)]) {
    for (key, value) in req_options {
        if let Some(v) = value {
            options.insert((*key).to_string(), v.clone());
        }
    }
}

/// Split multimodal `content` into concatenated text and a list of image
/// payloads.
fn content_to_text_and_images(content: &Value) -> (String, Vec<String>) {
    match content {
        Value::String(s) => (s.clone(), vec![]),
        Value::Null => (String::new(), vec![]),
        Value::Array(parts) => {
            let mut texts = Vec::new();
            let mut images = Vec::new();
            for part in parts {
                match part.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(t) = part.get("text").and_then(Value::as_str) {
                            texts.push(t.to_string());
                        }
                    }
                    Some("image_url") => {
                        if let Some(url) = part
                            .get("image_url")
                            .and_then(|v| v.get("url"))
                            .and_then(Value::as_str)
                        {
                            images.push(extract_image_payload(url));
                        }
                    }
                    _ => {}
                }
            }
            (texts.join("\n"), images)
        }
        other => (other.to_string(), vec![]),
    }
}

/// Strip a `data:image/...;base64,<B>` prefix if present, keeping only the
/// base64 payload; otherwise keep the URL verbatim.
fn extract_image_payload(url: &str) -> String {
    match url.find(";base64,") {
        Some(idx) if url.starts_with("data:image/") => url[idx + ";base64,".len()..].to_string(),
        _ => url.to_string(),
    }
}

/// Canonicalize tool-call arguments to an object: parse a string as JSON
/// (empty object on failure), or pass an already-decoded object through.
fn canonicalize_arguments(raw: &Value) -> Value {
    match raw {
        Value::String(s) => {
            serde_json::from_str::<Value>(s).unwrap_or_else(|_| Value::Object(Map::new()))
        }
        Value::Object(_) => raw.clone(),
        _ => Value::Object(Map::new()),
    }
}

fn tool_reply_content(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Translate an OpenAI chat-completion request into Ollama's `/api/chat` shape.
#[must_use]
pub fn chat_to_ollama(req: &ChatCompletionRequest) -> OllamaChatRequest {
    let messages = req
        .messages
        .iter()
        .map(|m| {
            if m.role == "tool" {
                return OllamaMessage {
                    role: m.role.clone(),
                    content: tool_reply_content(&m.content),
                    images: None,
                    tool_calls: None,
                    tool_call_id: m.tool_call_id.clone(),
                };
            }

            let tool_calls = m.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|c| OllamaToolCall {
                        function: OllamaToolCallFunction {
                            name: c.function.name.clone(),
                            arguments: canonicalize_arguments(&c.function.arguments),
                        },
                    })
                    .collect()
            });

            let (text, images) = content_to_text_and_images(&m.content);
            OllamaMessage {
                role: m.role.clone(),
                content: text,
                images: if images.is_empty() { None } else { Some(images) },
                tool_calls,
                tool_call_id: None,
            }
        })
        .collect();

    let mut options = Map::new();
    apply_shared_options(
        &mut options,
        &[
            ("temperature", req.temperature.map(Into::into)),
            ("top_p", req.top_p.map(Into::into)),
            ("top_k", req.top_k.map(Into::into)),
            ("seed", req.seed.map(Into::into)),
            ("stop", req.stop.clone()),
            ("frequency_penalty", req.frequency_penalty.map(Into::into)),
            ("presence_penalty", req.presence_penalty.map(Into::into)),
            ("num_ctx", req.num_ctx.map(Into::into)),
            ("repeat_penalty", req.repeat_penalty.map(Into::into)),
        ],
    );
    // max_tokens, then max_completion_tokens (latter wins) -> num_predict.
    if let Some(v) = req.max_tokens {
        options.insert("num_predict".to_string(), v.into());
    }
    if let Some(v) = req.max_completion_tokens {
        options.insert("num_predict".to_string(), v.into());
    }

    let format = req.response_format.as_ref().and_then(|rf| match rf.kind.as_str() {
        "json_object" => Some(Value::String("json".to_string())),
        "json_schema" => rf
            .json_schema
            .as_ref()
            .and_then(|s| s.schema.clone())
            .filter(Value::is_object),
        _ => None,
    });

    let tools = req.tools.as_ref().map(|tools| {
        tools
            .iter()
            .map(|t| OllamaTool {
                kind: t.kind.clone(),
                function: serde_json::to_value(&t.function).unwrap_or(Value::Null),
            })
            .collect()
    });

    OllamaChatRequest {
        model: req.model.clone(),
        messages,
        stream: req.stream,
        tools,
        options: Value::Object(options),
        format,
        think: req.think.clone(),
        keep_alive: req.keep_alive.clone(),
    }
}

/// Translate an OpenAI legacy completion request into Ollama's `/api/generate` shape.
#[must_use]
pub fn completion_to_ollama(req: &CompletionRequest) -> OllamaGenerateRequest {
    let mut options = Map::new();
    apply_shared_options(
        &mut options,
        &[
            ("temperature", req.temperature.map(Into::into)),
            ("top_p", req.top_p.map(Into::into)),
            ("top_k", req.top_k.map(Into::into)),
            ("seed", req.seed.map(Into::into)),
            ("stop", req.stop.clone()),
            ("frequency_penalty", req.frequency_penalty.map(Into::into)),
            ("presence_penalty", req.presence_penalty.map(Into::into)),
            ("num_ctx", req.num_ctx.map(Into::into)),
            ("repeat_penalty", req.repeat_penalty.map(Into::into)),
        ],
    );
    if let Some(v) = req.max_tokens {
        options.insert("num_predict".to_string(), v.into());
    }

    OllamaGenerateRequest {
        model: req.model.clone(),
        prompt: req.prompt.clone(),
        stream: req.stream,
        suffix: req.suffix.clone(),
        options: Value::Object(options),
    }
}

/// Translate an OpenAI embeddings request into Ollama's `/api/embed` shape.
/// A string input is wrapped into a single-element array; an array is kept.
#[must_use]
pub fn embeddings_to_ollama(req: &EmbeddingsRequest) -> OllamaEmbedRequest {
    let input = match &req.input {
        Value::String(s) => Value::Array(vec![Value::String(s.clone())]),
        other => other.clone(),
    };
    OllamaEmbedRequest {
        model: req.model.clone(),
        input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::ChatMessage;

    fn msg(role: &str, content: Value) -> ChatMessage {
        ChatMessage {
            role: role.to_string(),
            content,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    #[test]
    fn multimodal_message_splits_text_and_images() {
        let content = serde_json::json!([
            {"type": "text", "text": "A"},
            {"type": "image_url", "image_url": {"url": "data:image/png;base64,iVBORw0"}},
            {"type": "text", "text": "B"},
        ]);
        let (text, images) = content_to_text_and_images(&content);
        assert_eq!(text, "A\nB");
        assert_eq!(images, vec!["iVBORw0".to_string()]);
    }

    #[test]
    fn plain_url_kept_verbatim_without_data_prefix() {
        let content = serde_json::json!([
            {"type": "image_url", "image_url": {"url": "https://example.com/a.png"}},
        ]);
        let (_, images) = content_to_text_and_images(&content);
        assert_eq!(images, vec!["https://example.com/a.png".to_string()]);
    }

    #[test]
    fn null_content_becomes_empty_string() {
        let (text, images) = content_to_text_and_images(&Value::Null);
        assert_eq!(text, "");
        assert!(images.is_empty());
    }

    #[test]
    fn max_completion_tokens_wins_over_max_tokens() {
        let req = ChatCompletionRequest {
            model: "m".into(),
            messages: vec![msg("user", Value::String("hi".into()))],
            stream: false,
            temperature: None,
            top_p: None,
            top_k: None,
            seed: None,
            stop: None,
            frequency_penalty: None,
            presence_penalty: None,
            num_ctx: None,
            repeat_penalty: None,
            max_tokens: Some(10),
            max_completion_tokens: Some(20),
            response_format: None,
            think: None,
            keep_alive: None,
            tools: None,
        };
        let ollama = chat_to_ollama(&req);
        assert_eq!(ollama.options["num_predict"], 20);
    }

    #[test]
    fn tool_call_arguments_parsed_from_string() {
        let raw = Value::String("{\"a\":1}".to_string());
        assert_eq!(canonicalize_arguments(&raw), serde_json::json!({"a": 1}));
    }

    #[test]
    fn tool_call_arguments_invalid_json_becomes_empty_object() {
        let raw = Value::String("not json".to_string());
        assert_eq!(canonicalize_arguments(&raw), serde_json::json!({}));
    }

    #[test]
    fn string_embeddings_input_wrapped_into_array() {
        let req = EmbeddingsRequest {
            model: "m".into(),
            input: Value::String("hello".into()),
        };
        let ollama = embeddings_to_ollama(&req);
        assert_eq!(ollama.input, serde_json::json!(["hello"]));
    }

    #[test]
    fn array_embeddings_input_preserved() {
        let req = EmbeddingsRequest {
            model: "m".into(),
            input: serde_json::json!(["a", "b"]),
        };
        let ollama = embeddings_to_ollama(&req);
        assert_eq!(ollama.input, serde_json::json!(["a", "b"]));
    }
}
