//! Settings shared by every command that talks to a container registry.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::io::config::PivotConfig;
use crate::io::fs::{file_exists, path_arg};
use crate::io::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryAccess {
    /// Pull secret, passed as `--authfile` when present.
    pub auth_file: Option<PathBuf>,
    pub retry: RetryPolicy,
    /// Per-attempt time limit.
    pub timeout: Option<Duration>,
}

impl RegistryAccess {
    /// Build from config, using the pull secret only if it exists on disk.
    pub fn from_config(config: &PivotConfig) -> Self {
        let auth_path = &config.paths.auth_file;
        let auth_file = if file_exists(auth_path) {
            debug!(path = %auth_path.display(), "using pull secret");
            Some(auth_path.clone())
        } else {
            None
        };
        Self {
            auth_file,
            retry: config.network.retry_policy(),
            timeout: config.network.timeout(),
        }
    }

    pub fn auth_args(&self) -> Vec<String> {
        match &self.auth_file {
            Some(path) => vec!["--authfile".to_string(), path_arg(path)],
            None => Vec::new(),
        }
    }
}
