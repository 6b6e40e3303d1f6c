//! Axum HTTP gateway: middleware chain, proxy-with-retry, and the SSE
//! relay that translates Ollama's NDJSON stream into OpenAI's SSE shape.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod retry;
pub mod routes;
pub mod server;
pub mod sse;
pub mod state;

pub use server::serve;
pub use state::AppState;
