//! Router construction: the OpenAI-compatible surface under `/v1`, with
//! bare aliases for the four verbs clients commonly call without the
//! prefix. Builds one `Router<AppState>` and applies middleware once.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{chat, completions, embeddings, models};
use crate::middleware::admission;
use crate::state::AppState;

/// `/v1/*` plus the bare aliases, with the admission middleware chain
/// applied to every route in this router (never to `/health`).
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/models", get(models::list))
        .route("/v1/models/{id}", get(models::get))
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route("/v1/completions", post(completions::completions))
        .route("/v1/embeddings", post(embeddings::embeddings))
        .route("/models", get(models::list))
        .route("/chat/completions", post(chat::chat_completions))
        .route("/completions", post(completions::completions))
        .route("/embeddings", post(embeddings::embeddings))
}

pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(
            api_routes()
                .layer(axum::middleware::from_fn_with_state(state.clone(), admission))
                .with_state(state),
        )
}

async fn health_check() -> &'static str {
    "OK"
}
