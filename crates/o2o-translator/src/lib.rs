//! Stateless, synchronous OpenAI <-> Ollama wire-format translation.
//!
//! Every function in this crate is a pure mapping: no I/O, no shared state,
//! nothing beyond the inputs it is handed. The request pipeline (in
//! `o2o-proxy`) owns all the side effects; this crate only reshapes JSON.

pub mod ids;
pub mod ollama;
pub mod openai;
pub mod request;
pub mod response;
pub mod stream;
pub mod tokens;

pub use request::{chat_to_ollama, completion_to_ollama, embeddings_to_ollama};
pub use response::{
    chat_from_ollama, completion_from_ollama, embeddings_from_ollama,
};
pub use stream::{ChatStreamState, StreamKind};
