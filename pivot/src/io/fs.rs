//! Small filesystem helpers with the error tolerance pivot needs.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// True if `path` exists. Stat failures other than "not found" are logged.
pub fn file_exists(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(_) => true,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "not present");
            false
        }
        Err(err) => {
            warn!(path = %path.display(), "failed to stat: {err}");
            false
        }
    }
}

/// Render a path as a command-line argument.
pub fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Read a file and strip surrounding whitespace.
pub fn read_trimmed(path: &Path) -> Result<String> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(contents.trim().to_string())
}

/// Remove `path`, treating an already missing file as success.
///
/// Returns whether a file was actually removed.
pub fn remove_file_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("failed to delete {}", path.display())),
    }
}
