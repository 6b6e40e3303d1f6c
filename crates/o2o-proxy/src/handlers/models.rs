//! `GET /v1/models` and `GET /v1/models/:id`: synthesized by selecting a
//! backend and proxying to Ollama's native `/tags`, the only place in
//! the gateway where the model list genuinely lives.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use o2o_core::{GatewayError, GatewayErrorKind};
use o2o_registry::{url::build_target_url, Selector};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModelTag>,
}

#[derive(Debug, Deserialize)]
struct OllamaModelTag {
    name: String,
    #[serde(default)]
    modified_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelObject {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub owned_by: &'static str,
}

#[derive(Debug, Serialize)]
struct ModelsListResponse {
    object: &'static str,
    data: Vec<ModelObject>,
}

async fn fetch_tags(state: &AppState) -> Result<Vec<ModelObject>, ApiError> {
    // Model listing has no target model of its own; this only reaches a
    // channel whose allow-list is empty (permits everything). A channel
    // scoped to specific models is skipped here even though it could
    // serve chat traffic for those models.
    let Some(selection) = Selector::select(&state.credentials, &state.channels, "") else {
        return Err(GatewayError::new(GatewayErrorKind::NoBackends, "no backend credentials available").into());
    };

    let url = build_target_url(&selection.credential.base_url, "/tags");
    let mut req = state.http.get(&url).timeout(state.config.connect_timeout);
    if !selection.credential.key.is_empty() {
        req = req.bearer_auth(&selection.credential.key);
    }

    let response = req.send().await.map_err(|err| GatewayError::upstream(502, err.to_string()))?;
    if !response.status().is_success() {
        let status = response.status().as_u16();
        return Err(GatewayError::upstream(status, "failed to list models").into());
    }

    let tags: OllamaTagsResponse = response
        .json()
        .await
        .map_err(|err| GatewayError::new(GatewayErrorKind::ServerError, err.to_string()))?;

    Ok(tags
        .models
        .into_iter()
        .map(|m| ModelObject {
            id: m.name,
            object: "model",
            created: m.modified_at.as_deref().map(parse_modified_at).unwrap_or(0),
            owned_by: "ollama",
        })
        .collect())
}

/// Ollama's `modified_at` is RFC 3339; a model missing or malformed
/// timestamp just falls back to the epoch rather than failing the listing.
fn parse_modified_at(timestamp: &str) -> i64 {
    chrono::DateTime::parse_from_rfc3339(timestamp).map(|dt| dt.timestamp()).unwrap_or(0)
}

pub async fn list(State(state): State<AppState>) -> Result<Response, ApiError> {
    let models = fetch_tags(&state).await?;
    Ok(Json(ModelsListResponse { object: "list", data: models }).into_response())
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let models = fetch_tags(&state).await?;
    match models.into_iter().find(|m| m.id == id) {
        Some(model) => Ok(Json(model).into_response()),
        None => Err(GatewayError::new(GatewayErrorKind::NotFound, format!("model {id:?} not found")).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_modified_at_reads_rfc3339_timestamps() {
        assert_eq!(parse_modified_at("2024-01-15T10:30:00Z"), 1705314600);
    }

    #[test]
    fn parse_modified_at_falls_back_to_epoch_on_garbage() {
        assert_eq!(parse_modified_at("not-a-timestamp"), 0);
    }
}
