//! File names for each persisted store.

use std::path::PathBuf;

use o2o_core::paths::{data_dir, PathError};

#[must_use]
pub fn keys_path(base: &std::path::Path) -> PathBuf {
    base.join("keys.json")
}

#[must_use]
pub fn channels_path(base: &std::path::Path) -> PathBuf {
    base.join("channels.json")
}

#[must_use]
pub fn tokens_path(base: &std::path::Path) -> PathBuf {
    base.join("tokens.json")
}

#[must_use]
pub fn access_path(base: &std::path::Path) -> PathBuf {
    base.join("access.json")
}

#[must_use]
pub fn stats_path(base: &std::path::Path) -> PathBuf {
    base.join("stats.json")
}

/// Resolve the base data directory, per `o2o_core::paths::data_dir`.
pub fn resolve_base_dir() -> Result<PathBuf, PathError> {
    data_dir()
}
