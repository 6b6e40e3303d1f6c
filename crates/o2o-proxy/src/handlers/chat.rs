//! `POST /v1/chat/completions`: translate, proxy with retry, and either
//! return the translated response or hand off to the SSE relay.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use o2o_core::{GatewayError, GatewayErrorKind};
use o2o_translator::stream::StreamKind;
use o2o_translator::{chat_from_ollama, chat_to_ollama};
use tracing::info;

use crate::error::ApiError;
use crate::middleware::RequestContext;
use crate::retry::{self, proxy_with_retry};
use crate::sse;
use crate::state::AppState;

pub async fn chat_completions(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<o2o_translator::openai::ChatCompletionRequest>,
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

    let is_stream = request.stream;
    let ollama_request = chat_to_ollama(&request);
    let prompt_text = ollama_request
        .messages
        .iter()
        .filter(|m| m.role == "user")
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let body = serde_json::to_value(&ollama_request)
        .map_err(|err| GatewayError::new(GatewayErrorKind::ServerError, err.to_string()))?;

    info!(model = %request.model, streaming = is_stream, "chat completion request");

    let attempt = proxy_with_retry(&state, "/chat", body, is_stream, &request.model).await?;
    let model = attempt.selection.resolved_model.clone();
    let token_id = ctx.token.as_ref().map(|t| t.id.clone());

    if is_stream {
        return Ok(sse::relay(state, attempt.selection, token_id, StreamKind::Chat, model, attempt.response));
    }

    let body_bytes = attempt
        .response
        .bytes()
        .await
        .map_err(|err| GatewayError::upstream(502, err.to_string()))?;
    let upstream: o2o_translator::ollama::OllamaChatResponse = serde_json::from_slice(&body_bytes)
        .map_err(|err| GatewayError::new(GatewayErrorKind::ServerError, err.to_string()))?;

    let response = chat_from_ollama(&upstream, &request.model, &prompt_text);

    retry::record_success(&state, &attempt.selection);
    retry::release_slot(&state, &attempt.selection);
    if let Some(token_id) = &token_id {
        state
            .tokens
            .record_usage(token_id, u64::from(response.usage.prompt_tokens), u64::from(response.usage.completion_tokens));
    }

    Ok(Json(response).into_response())
}
