//! Proxy-with-retry: resolve a backend, forward the (already-translated)
//! body, retry on 401/403 or transport failure on a *different* backend,
//! give up after `MAX_RETRIES + 1` attempts.

use o2o_core::{GatewayError, GatewayErrorKind};
use o2o_registry::{url::build_target_url, Selection, Selector};
use serde_json::Value;

use crate::error::ApiError;
use crate::state::AppState;

/// One successfully dispatched attempt, handed back to the caller so it
/// can decide how/when to record success and release the channel slot
/// (immediately for non-streaming, at relay-finish for streaming).
pub struct ProxyAttempt {
    pub response: reqwest::Response,
    pub selection: Selection,
}

/// Forward `body` to `path` (e.g. `/api/chat`), substituting the
/// selector's resolved model name, up to `MAX_RETRIES + 1` times.
pub async fn proxy_with_retry(
    state: &AppState,
    path: &str,
    mut body: Value,
    is_stream: bool,
    model: &str,
) -> Result<ProxyAttempt, ApiError> {
    let total_attempts = state.config.max_retries + 1;
    let mut last_transport_error = false;
    let mut last_status: Option<u16> = None;
    let mut last_message = String::new();

    for attempt in 0..total_attempts {
        let Some(selection) = Selector::select(&state.credentials, &state.channels, model) else {
            return Err(GatewayError::new(GatewayErrorKind::NoBackends, "no backend credentials available").into());
        };

        if let Some(obj) = body.as_object_mut() {
            obj.insert("model".to_string(), Value::String(selection.resolved_model.clone()));
        }

        let url = build_target_url(&selection.credential.base_url, path);
        let timeout = if is_stream { state.config.connect_timeout } else { state.config.request_timeout };

        let mut req = state.http.post(&url).timeout(timeout).json(&body);
        if !selection.credential.key.is_empty() {
            req = req.bearer_auth(&selection.credential.key);
        }

        match req.send().await {
            Ok(response) if response.status().is_success() => {
                return Ok(ProxyAttempt { response, selection });
            }
            Ok(response) => {
                let status = response.status().as_u16();
                let body_text = response.text().await.unwrap_or_default();
                let truncated: String = body_text.chars().take(200).collect();
                record_failure(state, &selection, &truncated);

                last_transport_error = false;
                last_status = Some(status);
                last_message = truncated;

                let is_auth_failure = status == 401 || status == 403;
                if is_auth_failure && attempt + 1 < total_attempts {
                    continue;
                }
                return Err(GatewayError::upstream(status, last_message).into());
            }
            Err(err) => {
                let message = err.to_string();
                record_failure(state, &selection, &message);

                last_transport_error = true;
                last_message = message;

                if attempt + 1 < total_attempts {
                    continue;
                }
            }
        }
    }

    if last_transport_error {
        Err(GatewayError::upstream(504, last_message).into())
    } else {
        Err(GatewayError::upstream(last_status.unwrap_or(502), last_message).into())
    }
}

/// Record a failed attempt on the chosen credential and (if one was
/// picked) its channel, releasing the channel's concurrency slot — the
/// attempt is abandoned, so its slot is freed immediately rather than
/// waiting for a relay that will never run against this backend.
fn record_failure(state: &AppState, selection: &Selection, message: &str) {
    state.credentials.record_failure(&selection.credential.id, message);
    state.stats.record_failure(&selection.credential.id);
    if let Some(channel_id) = &selection.channel_id {
        state.channels.record_failure(channel_id);
        state.channels.release_slot(channel_id);
    }
}

/// Record a successful attempt on the credential and its channel. The
/// channel slot is released by the caller once the response (streaming or
/// not) has actually finished.
pub fn record_success(state: &AppState, selection: &Selection) {
    state.credentials.record_success(&selection.credential.id);
    state.stats.record_success(&selection.credential.id);
    if let Some(channel_id) = &selection.channel_id {
        state.channels.record_success(channel_id);
    }
}

/// Release a channel's concurrency slot at relay finish or relay failure.
pub fn release_slot(state: &AppState, selection: &Selection) {
    if let Some(channel_id) = &selection.channel_id {
        state.channels.release_slot(channel_id);
    }
}
