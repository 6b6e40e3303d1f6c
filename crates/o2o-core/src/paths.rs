//! Data-directory resolution for persisted state.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("could not determine the user's data directory")]
    NoDataDir,
}

const DATA_DIR_ENV: &str = "O2O_DATA_DIR";
const DEFAULT_DIR_NAME: &str = "o2o-gateway";

/// Resolve the directory `keys.json`/`channels.json`/... live in.
///
/// Resolution order: `O2O_DATA_DIR` env var, then the platform data
/// directory (`~/.local/share/o2o-gateway` on Linux), joined with
/// `o2o-gateway` when the override isn't already an app-specific path.
pub fn data_dir() -> Result<PathBuf, PathError> {
    if let Ok(explicit) = std::env::var(DATA_DIR_ENV) {
        if !explicit.trim().is_empty() {
            return Ok(PathBuf::from(explicit));
        }
    }
    let base = dirs::data_dir().ok_or(PathError::NoDataDir)?;
    Ok(base.join(DEFAULT_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins() {
        // SAFETY: test-local env mutation, single-threaded test body.
        unsafe {
            std::env::set_var(DATA_DIR_ENV, "/tmp/o2o-test-data");
        }
        assert_eq!(data_dir().unwrap(), PathBuf::from("/tmp/o2o-test-data"));
        unsafe {
            std::env::remove_var(DATA_DIR_ENV);
        }
    }
}
