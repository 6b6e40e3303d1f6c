//! Persistence errors. Callers are expected to log and swallow these —
//! a debounced write failure should never fail the request that
//! triggered it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error persisting state: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error persisting state: {0}")]
    Serde(#[from] serde_json::Error),
}
