//! `POST /v1/embeddings`. Never streamed.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use o2o_core::{GatewayError, GatewayErrorKind};
use o2o_translator::{embeddings_from_ollama, embeddings_to_ollama};
use serde_json::Value;

use crate::error::ApiError;
use crate::middleware::RequestContext;
use crate::retry::{self, proxy_with_retry};
use crate::state::AppState;

/// Flatten an OpenAI embeddings `input` (string or array of strings) into
/// the list of inputs the token-estimate fallback needs.
fn inputs_as_strings(input: &Value) -> Vec<String> {
    match input {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    }
}

pub async fn embeddings(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<o2o_translator::openai::EmbeddingsRequest>,
) -> Result<Response, ApiError> {
    if request.model.trim().is_empty() {
        return Err(GatewayError::new(GatewayErrorKind::InvalidRequest, "missing model").into());
    }

    if let Some(token) = &ctx.token {
        if !token.allows_model(&request.model) {
            return Err(GatewayError::new(
                GatewayErrorKind::PermissionError,
                format!("token does not permit model {:?}", request.model),
            )
            .into());
        }
    }

    let inputs = inputs_as_strings(&request.input);
    let ollama_request = embeddings_to_ollama(&request);
    let body = serde_json::to_value(&ollama_request)
        .map_err(|err| GatewayError::new(GatewayErrorKind::ServerError, err.to_string()))?;

    let attempt = proxy_with_retry(&state, "/embed", body, false, &request.model).await?;

    let body_bytes = attempt
        .response
        .bytes()
        .await
        .map_err(|err| GatewayError::upstream(502, err.to_string()))?;
    let upstream: o2o_translator::ollama::OllamaEmbedResponse = serde_json::from_slice(&body_bytes)
        .map_err(|err| GatewayError::new(GatewayErrorKind::ServerError, err.to_string()))?;

    let response = embeddings_from_ollama(&upstream, &request.model, &inputs);

    retry::record_success(&state, &attempt.selection);
    retry::release_slot(&state, &attempt.selection);
    if let Some(token) = &ctx.token {
        state
            .tokens
            .record_usage(&token.id, u64::from(response.usage.prompt_tokens), u64::from(response.usage.completion_tokens));
    }

    Ok(Json(response).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_single_string_input() {
        assert_eq!(inputs_as_strings(&Value::String("hello".into())), vec!["hello".to_string()]);
    }

    #[test]
    fn flattens_array_input_skipping_non_strings() {
        let input = serde_json::json!(["a", "b", 3]);
        assert_eq!(inputs_as_strings(&input), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn other_shapes_flatten_to_empty() {
        assert!(inputs_as_strings(&Value::Null).is_empty());
    }
}
