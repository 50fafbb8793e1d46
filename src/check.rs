//! Fail-fast check that a stage's input file is present.

use crate::error::IngestError;
use std::path::Path;
use tracing::{error, info};

/// Verify `path` is an existing regular file.
///
/// On failure logs the missing path, the working directory and where the file is
/// expected to live, then returns [`IngestError::MissingInput`].
///
/// # Errors
/// Returns [`IngestError::MissingInput`] if `path` does not exist or is not a file.
pub fn ensure_input_exists(path: impl AsRef<Path>) -> Result<(), IngestError> {
    let path = path.as_ref();
    if path.is_file() {
        return Ok(());
    }
    error!(path = %path.display(), "input file not found");
    match std::env::current_dir() {
        Ok(cwd) => info!("current working directory: {}", cwd.display()),
        Err(e) => info!("current working directory is unavailable: {e}"),
    }
    let expected_dir = path
        .parent()
        .map_or_else(|| "data/".to_string(), |p| format!("{}/", p.display()));
    info!("make sure the file is placed in {expected_dir}");
    Err(IngestError::MissingInput {
        path: path.to_path_buf(),
    })
}
